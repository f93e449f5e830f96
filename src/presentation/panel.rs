// Latest panel - Sink that keeps the most recent value of every display
use crate::application::instrument_state;
use crate::application::orchestrator::{InstrumentSink, PanelUpdate};
use crate::domain::connection::ConnectionState;
use crate::domain::instruments::{FlightInstruments, ScanPoint, StatusDescriptor, VideoStatus};
use crate::domain::video::DecodedFrame;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSnapshot {
    pub connection: ConnectionState,
    pub status: StatusDescriptor,
    pub instruments: Option<FlightInstruments>,
    pub video: VideoStatus,
    pub scan: Vec<ScanPoint>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PanelSnapshot {
    fn default() -> Self {
        let connection = ConnectionState::default();
        Self {
            status: instrument_state::connection_status(&connection),
            connection,
            instruments: None,
            video: VideoStatus::default(),
            scan: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Receivers handed to the HTTP surface.
#[derive(Clone)]
pub struct PanelWatch {
    pub snapshot: watch::Receiver<PanelSnapshot>,
    pub frame: watch::Receiver<Option<DecodedFrame>>,
}

pub struct LatestPanel {
    snapshot: watch::Sender<PanelSnapshot>,
    frame: watch::Sender<Option<DecodedFrame>>,
}

impl LatestPanel {
    pub fn new() -> (Self, PanelWatch) {
        let (snapshot, snapshot_rx) = watch::channel(PanelSnapshot::default());
        let (frame, frame_rx) = watch::channel(None);
        (
            Self { snapshot, frame },
            PanelWatch {
                snapshot: snapshot_rx,
                frame: frame_rx,
            },
        )
    }
}

impl InstrumentSink for LatestPanel {
    fn consume(&self, update: PanelUpdate) {
        self.snapshot.send_modify(|panel| {
            match &update {
                PanelUpdate::Instruments(instruments) => {
                    panel.instruments = Some(instruments.clone());
                }
                PanelUpdate::Status { state, status } => {
                    panel.connection = state.clone();
                    panel.status = status.clone();
                }
                PanelUpdate::Video(frame) => {
                    panel.video = VideoStatus {
                        sequence: Some(frame.sequence),
                        width: frame.width(),
                        height: frame.height(),
                        frames_decoded: panel.video.frames_decoded + 1,
                    };
                }
                PanelUpdate::Scan(points) => panel.scan = points.clone(),
            }
            panel.updated_at = Utc::now();
        });

        if let PanelUpdate::Video(frame) = update {
            self.frame.send_replace(Some(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instruments::StatusTone;
    use image::RgbImage;
    use std::sync::Arc;

    fn frame(sequence: u64) -> DecodedFrame {
        DecodedFrame {
            sequence,
            image: Arc::new(RgbImage::new(4, 3)),
        }
    }

    #[test]
    fn test_starts_disconnected() {
        let (_panel, watch) = LatestPanel::new();
        let snapshot = watch.snapshot.borrow().clone();
        assert_eq!(snapshot.connection, ConnectionState::Disconnected);
        assert_eq!(snapshot.status.tone, StatusTone::Idle);
        assert!(snapshot.instruments.is_none());
        assert!(watch.frame.borrow().is_none());
    }

    #[test]
    fn test_keeps_latest_of_each_display() {
        let (panel, watch) = LatestPanel::new();

        panel.consume(PanelUpdate::Video(frame(0)));
        panel.consume(PanelUpdate::Video(frame(1)));
        panel.consume(PanelUpdate::Scan(vec![ScanPoint {
            angle_rad: 0.0,
            radius: 2.0,
        }]));
        let state = ConnectionState::Connected("COM5 @ 57600".to_string());
        panel.consume(PanelUpdate::Status {
            status: instrument_state::connection_status(&state),
            state: state.clone(),
        });

        let snapshot = watch.snapshot.borrow().clone();
        assert_eq!(
            snapshot.video,
            VideoStatus {
                sequence: Some(1),
                width: 4,
                height: 3,
                frames_decoded: 2,
            }
        );
        assert_eq!(snapshot.scan.len(), 1);
        assert_eq!(snapshot.connection, state);
        assert_eq!(snapshot.status.tone, StatusTone::Ok);
        assert_eq!(watch.frame.borrow().as_ref().map(|f| f.sequence), Some(1));
    }
}
