// Transport traits for the telemetry link
use crate::domain::connection::SerialEndpoint;
use crate::domain::errors::{ConnectError, TransportError};
use crate::domain::telemetry::TelemetryMessage;
use async_trait::async_trait;

/// Parameters of the data-stream request sent right after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub rate_hz: u16,
    pub target_system: u8,
    pub target_component: u8,
}

/// An open request/response channel to the vehicle.
#[async_trait]
pub trait TelemetryTransport: Send {
    /// Ask the vehicle to stream every data group at `request.rate_hz`.
    async fn request_data_stream(&mut self, request: StreamRequest) -> Result<(), TransportError>;

    /// Next message off the wire. Must be cancel-safe: the link drops this
    /// future when a per-kind timeout fires.
    async fn recv(&mut self) -> Result<TelemetryMessage, TransportError>;

    /// Release the endpoint. Once this returns the same endpoint can be
    /// opened again.
    async fn close(&mut self) {}
}

/// Opens transports for an endpoint.
#[async_trait]
pub trait TelemetryConnector: Send + Sync {
    async fn open(
        &self,
        endpoint: &SerialEndpoint,
    ) -> Result<Box<dyn TelemetryTransport>, ConnectError>;
}
