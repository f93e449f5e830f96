// Error taxonomy shared by the ingestion workers
use crate::domain::telemetry::MessageKind;
use std::time::Duration;
use thiserror::Error;

/// Opening the telemetry endpoint failed. Surfaces as `ConnectionState::Error`.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no serial port selected")]
    EmptyPort,

    #[error("unsupported baud rate {0}")]
    InvalidBaud(u32),

    #[error("cannot open {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stream-rate request failed: {0}")]
    StreamRequest(#[from] TransportError),
}

/// A message kind did not arrive within its window. Never leaves the link.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("no {kind} message within {timeout:?}")]
pub struct PollTimeout {
    pub kind: MessageKind,
    pub timeout: Duration,
}

/// The telemetry session is gone; polling halts until a new connect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("telemetry link closed")]
    Closed,

    #[error("telemetry I/O failure: {0}")]
    Io(String),
}

/// HTTP failure on the video or ranging feeds.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("stream from {url} broke: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Malformed payload. Recovered locally: the frame or scan is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image decode failed: {0}")]
    Image(String),

    #[error("malformed ranging payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ranging payload holds no readings")]
    EmptyScan,
}

#[derive(Debug, Error)]
pub enum RangingError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
