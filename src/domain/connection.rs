// Telemetry connection state
use serde::Serialize;
use std::fmt;

/// Serial endpoint as picked in a connection dialog.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, Serialize)]
pub struct SerialEndpoint {
    pub port: String,
    pub baud: u32,
}

impl fmt::Display for SerialEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.port, self.baud)
    }
}

/// Only an explicit connect attempt moves this; an error sticks until then.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected(String),
    Error(String),
}
