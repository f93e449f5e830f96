// Telemetry link - Polls three message kinds per cycle over one connection
use crate::application::orchestrator::ProducerEvent;
use crate::application::telemetry_transport::{StreamRequest, TelemetryConnector, TelemetryTransport};
use crate::application::worker::WorkerHandle;
use crate::domain::connection::{ConnectionState, SerialEndpoint};
use crate::domain::errors::{ConnectError, PollTimeout, TransportError};
use crate::domain::telemetry::{MessageKind, TelemetryMessage, TelemetrySample, battery_from_raw};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSettings {
    pub stream_rate_hz: u16,
    pub poll_period: Duration,
    pub message_timeout: Duration,
    pub target_system: u8,
    pub target_component: u8,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            stream_rate_hz: 10,
            poll_period: Duration::from_millis(200),
            message_timeout: Duration::from_millis(500),
            target_system: 1,
            target_component: 1,
        }
    }
}

pub struct TelemetryLink {
    transport: Box<dyn TelemetryTransport>,
    endpoint: SerialEndpoint,
    settings: LinkSettings,
    sample: TelemetrySample,
    last_heartbeat: Option<Instant>,
}

impl TelemetryLink {
    /// Open the endpoint and immediately ask for all data groups at the
    /// configured rate.
    pub async fn connect(
        connector: &dyn TelemetryConnector,
        endpoint: SerialEndpoint,
        settings: LinkSettings,
    ) -> Result<Self, ConnectError> {
        validate_endpoint(&endpoint)?;

        let mut transport = connector.open(&endpoint).await?;
        let requested = transport
            .request_data_stream(StreamRequest {
                rate_hz: settings.stream_rate_hz,
                target_system: settings.target_system,
                target_component: settings.target_component,
            })
            .await;
        if let Err(e) = requested {
            transport.close().await;
            return Err(e.into());
        }

        tracing::info!("Telemetry connected on {}", endpoint);
        Ok(Self {
            transport,
            endpoint,
            settings,
            sample: TelemetrySample::default(),
            last_heartbeat: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::Connected(self.endpoint.to_string())
    }

    /// Run one polling cycle. The three waits are sequential, so a silent
    /// vehicle makes a cycle last the sum of the three timeouts.
    ///
    /// Air data and attitude fall back to zero when missing; battery keeps
    /// its previous value.
    pub async fn poll(&mut self) -> Result<TelemetrySample, TransportError> {
        match self.recv_match(MessageKind::AirData).await? {
            Some(TelemetryMessage::AirData {
                airspeed,
                altitude,
                climb,
            }) => {
                self.sample.airspeed = f64::from(airspeed);
                self.sample.altitude = f64::from(altitude);
                self.sample.vertical_speed = f64::from(climb);
                self.sample.since_heartbeat = self.last_heartbeat.map(|at| at.elapsed());
            }
            _ => {
                self.sample.airspeed = 0.0;
                self.sample.vertical_speed = 0.0;
            }
        }

        match self.recv_match(MessageKind::Attitude).await? {
            Some(TelemetryMessage::Attitude {
                roll_rad,
                pitch_rad,
            }) => {
                self.sample.roll_deg = f64::from(roll_rad).to_degrees();
                self.sample.pitch_deg = f64::from(pitch_rad).to_degrees();
            }
            _ => {
                self.sample.roll_deg = 0.0;
                self.sample.pitch_deg = 0.0;
            }
        }

        // Battery is stale-held, unlike the two kinds above.
        if let Some(TelemetryMessage::SystemStatus { battery_remaining }) =
            self.recv_match(MessageKind::SystemStatus).await?
        {
            self.sample.battery_percent = battery_from_raw(battery_remaining);
        }

        self.sample.timestamp = Utc::now();
        Ok(self.sample.clone())
    }

    /// Poll on a fixed period until stopped or the transport fails. A
    /// failure is reported once as `ConnectionState::Error` and ends the task.
    pub fn spawn(mut self, events: mpsc::Sender<ProducerEvent>) -> WorkerHandle {
        WorkerHandle::spawn("telemetry", move |cancel| async move {
            let mut ticker = tokio::time::interval(self.settings.poll_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let polled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    polled = self.poll() => polled,
                };

                match polled {
                    Ok(sample) => {
                        if events.send(ProducerEvent::Telemetry(sample)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telemetry session on {} lost: {}", self.endpoint, e);
                        let state = ConnectionState::Error(e.to_string());
                        let _ = events.send(ProducerEvent::Connection(state)).await;
                        break;
                    }
                }
            }

            self.transport.close().await;
        })
    }

    async fn recv_match(
        &mut self,
        kind: MessageKind,
    ) -> Result<Option<TelemetryMessage>, TransportError> {
        let timeout = self.settings.message_timeout;
        let wait = next_of_kind(self.transport.as_mut(), kind, &mut self.last_heartbeat);

        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(msg)) => Ok(Some(msg)),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::debug!("{}", PollTimeout { kind, timeout });
                Ok(None)
            }
        }
    }
}

/// Read until a message of `kind` shows up, discarding everything else but
/// noting heartbeats on the way.
async fn next_of_kind(
    transport: &mut dyn TelemetryTransport,
    kind: MessageKind,
    last_heartbeat: &mut Option<Instant>,
) -> Result<TelemetryMessage, TransportError> {
    loop {
        let msg = transport.recv().await?;
        if msg.kind() == Some(kind) {
            return Ok(msg);
        }
        if msg == TelemetryMessage::Heartbeat {
            *last_heartbeat = Some(Instant::now());
        }
    }
}

pub fn validate_endpoint(endpoint: &SerialEndpoint) -> Result<(), ConnectError> {
    if endpoint.port.trim().is_empty() {
        return Err(ConnectError::EmptyPort);
    }
    if !SUPPORTED_BAUD_RATES.contains(&endpoint.baud) {
        return Err(ConnectError::InvalidBaud(endpoint.baud));
    }
    Ok(())
}
