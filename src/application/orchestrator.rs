// Orchestrator - Owns the producer workers and routes their output
use crate::application::instrument_state;
use crate::application::ranging_stream::{RangingScanStream, RangingSource};
use crate::application::telemetry_link::{LinkSettings, TelemetryLink};
use crate::application::telemetry_transport::TelemetryConnector;
use crate::application::video_ingest::{ImageDecoder, VideoIngest, VideoSettings, VideoSource};
use crate::application::worker::WorkerHandle;
use crate::domain::connection::{ConnectionState, SerialEndpoint};
use crate::domain::errors::ConnectError;
use crate::domain::instruments::{FlightInstruments, ScanPoint, StatusDescriptor};
use crate::domain::ranging::RangingScan;
use crate::domain::telemetry::TelemetrySample;
use crate::domain::video::DecodedFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the producers hand to the router.
#[derive(Debug)]
pub enum ProducerEvent {
    Telemetry(TelemetrySample),
    Connection(ConnectionState),
    Frame(DecodedFrame),
    Scan(RangingScan),
}

/// What the router hands to the rendering surface.
#[derive(Debug, Clone)]
pub enum PanelUpdate {
    Instruments(FlightInstruments),
    Status {
        state: ConnectionState,
        status: StatusDescriptor,
    },
    Video(DecodedFrame),
    Scan(Vec<ScanPoint>),
}

/// The rendering surface. Called from the routing task only.
pub trait InstrumentSink: Send + Sync {
    fn consume(&self, update: PanelUpdate);
}

pub struct Collaborators {
    pub connector: Arc<dyn TelemetryConnector>,
    pub video_source: Arc<dyn VideoSource>,
    pub decoder: Arc<dyn ImageDecoder>,
    pub ranging_source: Arc<dyn RangingSource>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub link: LinkSettings,
    pub video: VideoSettings,
    pub ranging_period: Duration,
    pub event_capacity: usize,
}

pub struct Orchestrator {
    connector: Arc<dyn TelemetryConnector>,
    video: VideoIngest,
    ranging: RangingScanStream,
    link_settings: LinkSettings,
    events: mpsc::Sender<ProducerEvent>,
    router: WorkerHandle,
    telemetry_worker: Option<WorkerHandle>,
    video_worker: Option<WorkerHandle>,
    ranging_worker: Option<WorkerHandle>,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        settings: OrchestratorSettings,
        sink: Arc<dyn InstrumentSink>,
    ) -> Self {
        let (events, rx) = mpsc::channel(settings.event_capacity.max(1));
        let router = spawn_router(rx, sink);

        Self {
            connector: collaborators.connector,
            video: VideoIngest::new(
                collaborators.video_source,
                collaborators.decoder,
                settings.video,
            ),
            ranging: RangingScanStream::new(collaborators.ranging_source, settings.ranging_period),
            link_settings: settings.link,
            events,
            router,
            telemetry_worker: None,
            video_worker: None,
            ranging_worker: None,
        }
    }

    /// Replace the telemetry session. Whatever the outcome, the resulting
    /// state is published so the status display follows it.
    pub async fn connect_telemetry(
        &mut self,
        endpoint: SerialEndpoint,
    ) -> Result<ConnectionState, ConnectError> {
        if let Some(worker) = self.telemetry_worker.take() {
            worker.stop().await;
        }

        match TelemetryLink::connect(self.connector.as_ref(), endpoint.clone(), self.link_settings).await {
            Ok(link) => {
                let state = link.state();
                self.publish(ProducerEvent::Connection(state.clone())).await;
                self.telemetry_worker = Some(link.spawn(self.events.clone()));
                Ok(state)
            }
            Err(e) => {
                tracing::warn!("Telemetry connect to {} failed: {}", endpoint, e);
                self.publish(ProducerEvent::Connection(ConnectionState::Error(e.to_string())))
                    .await;
                Err(e)
            }
        }
    }

    /// Switch the video feed. The previous worker is fully stopped first so
    /// only one writer ever feeds frames to the router.
    pub async fn start_video(&mut self, url: String) {
        if let Some(worker) = self.video_worker.take() {
            worker.stop().await;
        }
        self.video_worker = Some(self.video.spawn(url, self.events.clone()));
    }

    pub async fn start_ranging(&mut self, host: String) {
        if let Some(worker) = self.ranging_worker.take() {
            worker.stop().await;
        }
        self.ranging_worker = Some(self.ranging.start(host, self.events.clone()));
    }

    pub fn video_active(&self) -> bool {
        self.video_worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub async fn shutdown(self) {
        for worker in [self.telemetry_worker, self.video_worker, self.ranging_worker]
            .into_iter()
            .flatten()
        {
            worker.stop().await;
        }
        self.router.stop().await;
        tracing::info!("All workers stopped");
    }

    async fn publish(&self, event: ProducerEvent) {
        if self.events.send(event).await.is_err() {
            tracing::warn!("Router is gone, dropping event");
        }
    }
}

fn spawn_router(
    mut rx: mpsc::Receiver<ProducerEvent>,
    sink: Arc<dyn InstrumentSink>,
) -> WorkerHandle {
    WorkerHandle::spawn("router", move |cancel| async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                Some(event) => sink.consume(route(event)),
                None => break,
            }
        }
    })
}

fn route(event: ProducerEvent) -> PanelUpdate {
    match event {
        ProducerEvent::Telemetry(sample) => {
            PanelUpdate::Instruments(instrument_state::flight_instruments(&sample))
        }
        ProducerEvent::Connection(state) => PanelUpdate::Status {
            status: instrument_state::connection_status(&state),
            state,
        },
        ProducerEvent::Frame(frame) => PanelUpdate::Video(frame),
        ProducerEvent::Scan(scan) => PanelUpdate::Scan(instrument_state::scan_points(&scan)),
    }
}
