// Domain layer - Plain data shared by every other layer
pub mod connection;
pub mod errors;
pub mod instruments;
pub mod ranging;
pub mod telemetry;
pub mod video;
