// Telemetry domain models
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The three payload kinds multiplexed over the telemetry connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    /// Airspeed, altitude and climb rate (VFR_HUD).
    AirData,
    /// Roll and pitch in radians (ATTITUDE).
    Attitude,
    /// Battery remaining percent (SYS_STATUS).
    SystemStatus,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::AirData => "VFR_HUD",
            MessageKind::Attitude => "ATTITUDE",
            MessageKind::SystemStatus => "SYS_STATUS",
        };
        f.write_str(name)
    }
}

/// Decoded telemetry message, independent of the wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryMessage {
    Heartbeat,
    AirData {
        airspeed: f32,
        altitude: f32,
        climb: f32,
    },
    Attitude {
        roll_rad: f32,
        pitch_rad: f32,
    },
    SystemStatus {
        battery_remaining: i8,
    },
    Other,
}

impl TelemetryMessage {
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            TelemetryMessage::AirData { .. } => Some(MessageKind::AirData),
            TelemetryMessage::Attitude { .. } => Some(MessageKind::Attitude),
            TelemetryMessage::SystemStatus { .. } => Some(MessageKind::SystemStatus),
            TelemetryMessage::Heartbeat | TelemetryMessage::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    /// m/s, reset to 0 when no air data arrives in a cycle.
    pub airspeed: f64,
    /// m, held across air data timeouts.
    pub altitude: f64,
    /// m/s, reset to 0 when no air data arrives in a cycle.
    pub vertical_speed: f64,
    pub roll_deg: f64,
    pub pitch_deg: f64,
    /// 0..=100, held across status timeouts.
    pub battery_percent: u8,
    /// Time since the last heartbeat, refreshed on air data.
    pub since_heartbeat: Option<Duration>,
    pub timestamp: DateTime<Utc>,
}

impl Default for TelemetrySample {
    fn default() -> Self {
        Self {
            airspeed: 0.0,
            altitude: 0.0,
            vertical_speed: 0.0,
            roll_deg: 0.0,
            pitch_deg: 0.0,
            battery_percent: 0,
            since_heartbeat: None,
            timestamp: Utc::now(),
        }
    }
}

/// Clamp the raw SYS_STATUS battery field; -1 means "unknown" on the wire.
pub fn battery_from_raw(raw: i8) -> u8 {
    raw.clamp(0, 100) as u8
}
