// MAVLink serial transport
use crate::application::telemetry_transport::{StreamRequest, TelemetryConnector, TelemetryTransport};
use crate::domain::connection::SerialEndpoint;
use crate::domain::errors::{ConnectError, TransportError};
use crate::domain::telemetry::TelemetryMessage;
use async_trait::async_trait;
use mavlink::ardupilotmega::{MavDataStream, MavMessage, REQUEST_DATA_STREAM_DATA};
use mavlink::error::MessageReadError;
use mavlink::peek_reader::PeekReader;
use mavlink::{MavHeader, MavlinkVersion};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound on one blocking read, and so on how long a stop takes.
const READ_TIMEOUT: Duration = Duration::from_millis(100);
const READ_QUEUE: usize = 256;

type Inbound = mpsc::Receiver<Result<TelemetryMessage, TransportError>>;

/// Opens the serial port directly; MAVLink is only used for framing.
#[derive(Debug, Clone, Copy)]
pub struct MavlinkConnector {
    pub system_id: u8,
    pub component_id: u8,
}

#[async_trait]
impl TelemetryConnector for MavlinkConnector {
    async fn open(
        &self,
        endpoint: &SerialEndpoint,
    ) -> Result<Box<dyn TelemetryTransport>, ConnectError> {
        let unreachable = |source: std::io::Error| ConnectError::Unreachable {
            endpoint: endpoint.to_string(),
            source,
        };

        let (port, baud) = (endpoint.port.clone(), endpoint.baud);
        let opened = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
            let writer = serialport::new(port, baud).timeout(READ_TIMEOUT).open()?;
            let reader = writer.try_clone()?;
            Ok((reader, writer))
        })
        .await
        .map_err(|e| unreachable(std::io::Error::other(e)))?;
        let (reader, writer) = opened.map_err(unreachable)?;

        let header = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: 0,
        };
        Ok(Box::new(MavlinkTransport::new(
            Box::new(reader),
            Box::new(writer),
            header,
        )))
    }
}

enum Reader {
    /// Not started yet; starts on the first `recv`.
    Idle(Box<dyn Read + Send>),
    Running {
        thread: ReaderThread,
        inbound: Inbound,
    },
    Closed,
}

/// Reads run on a dedicated thread; decoded messages come through a
/// channel, which keeps `recv` cancel-safe. Reads only start on the first
/// `recv`, so the stream request goes out on a quiet port.
pub struct MavlinkTransport {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    reader: Reader,
    header: MavHeader,
}

impl MavlinkTransport {
    pub fn new(
        reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
        header: MavHeader,
    ) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Reader::Idle(reader),
            header,
        }
    }

    fn inbound(&mut self) -> Result<&mut Inbound, TransportError> {
        if matches!(self.reader, Reader::Idle(_)) {
            let Reader::Idle(port) = std::mem::replace(&mut self.reader, Reader::Closed) else {
                return Err(TransportError::Closed);
            };
            let (tx, inbound) = mpsc::channel(READ_QUEUE);
            let thread = ReaderThread::spawn(port, tx).map_err(|e| TransportError::Io(e.to_string()))?;
            self.reader = Reader::Running { thread, inbound };
        }

        match &mut self.reader {
            Reader::Running { inbound, .. } => Ok(inbound),
            _ => Err(TransportError::Closed),
        }
    }
}

#[async_trait]
impl TelemetryTransport for MavlinkTransport {
    async fn request_data_stream(&mut self, request: StreamRequest) -> Result<(), TransportError> {
        let message = MavMessage::REQUEST_DATA_STREAM(REQUEST_DATA_STREAM_DATA {
            req_message_rate: request.rate_hz,
            target_system: request.target_system,
            target_component: request.target_component,
            req_stream_id: MavDataStream::MAV_DATA_STREAM_ALL as u8,
            start_stop: 1,
        });
        let header = self.header;
        self.header.sequence = self.header.sequence.wrapping_add(1);
        let writer = self.writer.clone();

        tokio::task::spawn_blocking(move || {
            let mut port = writer
                .lock()
                .map_err(|_| TransportError::Io("serial writer poisoned".to_string()))?;
            mavlink::write_versioned_msg(&mut *port, MavlinkVersion::V2, header, &message)
                .map_err(|e| TransportError::Io(e.to_string()))?;
            port.flush().map_err(|e| TransportError::Io(e.to_string()))
        })
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?
    }

    async fn recv(&mut self) -> Result<TelemetryMessage, TransportError> {
        self.inbound()?
            .recv()
            .await
            .unwrap_or(Err(TransportError::Closed))
    }

    async fn close(&mut self) {
        if let Reader::Running { thread, inbound } =
            std::mem::replace(&mut self.reader, Reader::Closed)
        {
            // Unblocks a reader stuck on a full queue
            drop(inbound);
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(()) => tracing::debug!("MAVLink reader joined"),
                Err(e) => tracing::warn!("Cannot join MAVLink reader: {}", e),
            }
        }
    }
}

impl Drop for MavlinkTransport {
    fn drop(&mut self) {
        if let Reader::Running { thread, .. } = &self.reader {
            thread.alive.store(false, Ordering::Release);
        }
    }
}

struct ReaderThread {
    alive: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl ReaderThread {
    fn spawn<R>(
        port: R,
        tx: mpsc::Sender<Result<TelemetryMessage, TransportError>>,
    ) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let flag = alive.clone();
        // Keeps a partial frame across read timeouts
        let mut port = PeekReader::new(port);

        let join = std::thread::Builder::new()
            .name("mavlink reader".to_string())
            .spawn(move || {
                while flag.load(Ordering::Acquire) {
                    let item = match mavlink::read_versioned_msg::<MavMessage, _>(
                        &mut port,
                        MavlinkVersion::V2,
                    ) {
                        Ok((_, message)) => Ok(to_domain(message)),
                        Err(MessageReadError::Io(e))
                            if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
                        {
                            continue;
                        }
                        Err(MessageReadError::Io(e)) => Err(TransportError::Io(e.to_string())),
                        Err(e) => {
                            tracing::debug!("Skipping unparseable MAVLink frame: {}", e);
                            continue;
                        }
                    };
                    let fatal = item.is_err();
                    if tx.blocking_send(item).is_err() || fatal {
                        break;
                    }
                }
                tracing::debug!("MAVLink reader stopped");
            })?;

        Ok(Self { alive, join })
    }

    /// Blocks for at most one read timeout.
    fn join(self) {
        self.alive.store(false, Ordering::Release);
        if self.join.join().is_err() {
            tracing::warn!("MAVLink reader panicked");
        }
    }
}

fn to_domain(message: MavMessage) -> TelemetryMessage {
    match message {
        MavMessage::HEARTBEAT(_) => TelemetryMessage::Heartbeat,
        MavMessage::VFR_HUD(data) => TelemetryMessage::AirData {
            airspeed: data.airspeed,
            altitude: data.alt,
            climb: data.climb,
        },
        MavMessage::ATTITUDE(data) => TelemetryMessage::Attitude {
            roll_rad: data.roll,
            pitch_rad: data.pitch,
        },
        MavMessage::SYS_STATUS(data) => TelemetryMessage::SystemStatus {
            battery_remaining: data.battery_remaining,
        },
        _ => TelemetryMessage::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::ardupilotmega::{ATTITUDE_DATA, SYS_STATUS_DATA, VFR_HUD_DATA};
    use std::io::Cursor;

    /// Serial port stand-in: serves `data`, then times out like an idle line.
    struct FakePort {
        data: Cursor<Vec<u8>>,
        released: Arc<AtomicBool>,
    }

    impl FakePort {
        fn new(data: Vec<u8>) -> (Self, Arc<AtomicBool>) {
            let released = Arc::new(AtomicBool::new(false));
            let port = Self {
                data: Cursor::new(data),
                released: released.clone(),
            };
            (port, released)
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                std::thread::sleep(Duration::from_millis(5));
                return Err(ErrorKind::TimedOut.into());
            }
            Ok(n)
        }
    }

    impl Drop for FakePort {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn header() -> MavHeader {
        MavHeader {
            system_id: 255,
            component_id: 190,
            sequence: 0,
        }
    }

    fn encode(message: &MavMessage) -> Vec<u8> {
        let mut out = Vec::new();
        let vehicle = MavHeader {
            system_id: 1,
            component_id: 1,
            sequence: 0,
        };
        mavlink::write_versioned_msg(&mut out, MavlinkVersion::V2, vehicle, message).unwrap();
        out
    }

    #[test]
    fn test_to_domain() {
        let hud = MavMessage::VFR_HUD(VFR_HUD_DATA {
            airspeed: 14.5,
            alt: 120.0,
            climb: -0.5,
            ..Default::default()
        });
        assert_eq!(
            to_domain(hud),
            TelemetryMessage::AirData {
                airspeed: 14.5,
                altitude: 120.0,
                climb: -0.5,
            }
        );

        let attitude = MavMessage::ATTITUDE(ATTITUDE_DATA {
            roll: 0.1,
            pitch: -0.2,
            ..Default::default()
        });
        assert_eq!(
            to_domain(attitude),
            TelemetryMessage::Attitude {
                roll_rad: 0.1,
                pitch_rad: -0.2,
            }
        );

        let status = MavMessage::SYS_STATUS(SYS_STATUS_DATA {
            battery_remaining: -1,
            ..Default::default()
        });
        assert_eq!(
            to_domain(status),
            TelemetryMessage::SystemStatus {
                battery_remaining: -1,
            }
        );
    }

    #[tokio::test]
    async fn test_stream_request_is_written_before_reads_start() {
        let (port, _released) = FakePort::new(Vec::new());
        let writer = SharedWriter::default();
        let mut transport = MavlinkTransport::new(Box::new(port), Box::new(writer.clone()), header());

        transport
            .request_data_stream(StreamRequest {
                rate_hz: 10,
                target_system: 1,
                target_component: 1,
            })
            .await
            .unwrap();
        assert!(matches!(transport.reader, Reader::Idle(_)));

        let written = writer.0.lock().unwrap().clone();
        let mut wire = PeekReader::new(Cursor::new(written));
        let (sent_header, message) =
            mavlink::read_versioned_msg::<MavMessage, _>(&mut wire, MavlinkVersion::V2).unwrap();
        assert_eq!(sent_header.system_id, 255);
        match message {
            MavMessage::REQUEST_DATA_STREAM(data) => {
                assert_eq!(data.req_message_rate, 10);
                assert_eq!(data.req_stream_id, MavDataStream::MAV_DATA_STREAM_ALL as u8);
                assert_eq!(data.start_stop, 1);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_messages_flow_through_reader() {
        let mut wire = encode(&MavMessage::VFR_HUD(VFR_HUD_DATA {
            airspeed: 12.0,
            alt: 50.0,
            climb: 1.0,
            ..Default::default()
        }));
        wire.extend(encode(&MavMessage::SYS_STATUS(SYS_STATUS_DATA {
            battery_remaining: 80,
            ..Default::default()
        })));
        let (port, _released) = FakePort::new(wire);
        let mut transport =
            MavlinkTransport::new(Box::new(port), Box::new(SharedWriter::default()), header());

        assert_eq!(
            transport.recv().await.unwrap(),
            TelemetryMessage::AirData {
                airspeed: 12.0,
                altitude: 50.0,
                climb: 1.0,
            }
        );
        assert_eq!(
            transport.recv().await.unwrap(),
            TelemetryMessage::SystemStatus {
                battery_remaining: 80,
            }
        );
        transport.close().await;
    }

    #[tokio::test]
    async fn test_close_releases_silent_port() {
        let (port, released) = FakePort::new(Vec::new());
        let mut transport =
            MavlinkTransport::new(Box::new(port), Box::new(SharedWriter::default()), header());

        let waited = tokio::time::timeout(Duration::from_millis(50), transport.recv()).await;
        assert!(waited.is_err());
        assert!(!released.load(Ordering::SeqCst));

        transport.close().await;
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(transport.recv().await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_missing_port_is_unreachable() {
        let connector = MavlinkConnector {
            system_id: 255,
            component_id: 190,
        };
        let endpoint = SerialEndpoint {
            port: "/dev/flightdeck-no-such-port".to_string(),
            baud: 57600,
        };
        let result = connector.open(&endpoint).await;
        assert!(matches!(result, Err(ConnectError::Unreachable { .. })));
    }
}
