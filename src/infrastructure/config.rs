use crate::application::frame_demuxer::DEFAULT_MAX_BUFFER_BYTES;
use crate::application::orchestrator::OrchestratorSettings;
use crate::application::telemetry_link::LinkSettings;
use crate::application::video_ingest::VideoSettings;
use crate::domain::connection::SerialEndpoint;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FlightdeckConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub video: VideoFeedSettings,
    #[serde(default)]
    pub ranging: RangingSettings,
    #[serde(default)]
    pub events: EventSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetrySettings {
    pub port: String,
    pub baud: u32,
    pub stream_rate_hz: u16,
    pub poll_period_ms: u64,
    pub message_timeout_ms: u64,
    pub target_system: u8,
    pub target_component: u8,
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    pub auto_connect: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            port: "COM5".to_string(),
            baud: 57600,
            stream_rate_hz: 10,
            poll_period_ms: 200,
            message_timeout_ms: 500,
            target_system: 1,
            target_component: 1,
            gcs_system_id: 255,
            gcs_component_id: 190,
            auto_connect: false,
        }
    }
}

impl TelemetrySettings {
    pub fn endpoint(&self) -> SerialEndpoint {
        SerialEndpoint {
            port: self.port.clone(),
            baud: self.baud,
        }
    }

    pub fn link(&self) -> LinkSettings {
        LinkSettings {
            stream_rate_hz: self.stream_rate_hz,
            poll_period: Duration::from_millis(self.poll_period_ms),
            message_timeout: Duration::from_millis(self.message_timeout_ms),
            target_system: self.target_system,
            target_component: self.target_component,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VideoFeedSettings {
    /// Camera `host:port`; the feed lives at `/video_feed`.
    pub address: String,
    pub max_buffer_bytes: usize,
    pub retry_backoff_ms: Option<u64>,
}

impl Default for VideoFeedSettings {
    fn default() -> Self {
        Self {
            address: "192.168.85.114:5000".to_string(),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            retry_backoff_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RangingSettings {
    pub host: String,
    pub period_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for RangingSettings {
    fn default() -> Self {
        Self {
            host: "192.168.85.114:5001".to_string(),
            period_ms: 500,
            request_timeout_ms: 5000,
        }
    }
}

impl RangingSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EventSettings {
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl FlightdeckConfig {
    pub fn orchestrator(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            link: self.telemetry.link(),
            video: VideoSettings {
                max_buffer_bytes: self.video.max_buffer_bytes,
                retry_backoff: self.video.retry_backoff_ms.map(Duration::from_millis),
            },
            ranging_period: Duration::from_millis(self.ranging.period_ms),
            event_capacity: self.events.capacity,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

pub fn load_config() -> anyhow::Result<FlightdeckConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/flightdeck").required(false))
        .add_source(config::Environment::with_prefix("FLIGHTDECK").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> FlightdeckConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_match_link_timing() {
        let config = parse("");
        let link = config.telemetry.link();
        assert_eq!(link.stream_rate_hz, 10);
        assert_eq!(link.poll_period, Duration::from_millis(200));
        assert_eq!(link.message_timeout, Duration::from_millis(500));
        assert_eq!(config.server.bind, "0.0.0.0:8080");

        let settings = config.orchestrator();
        assert_eq!(settings.ranging_period, Duration::from_millis(500));
        assert_eq!(settings.video.retry_backoff, None);
        assert_eq!(config.ranging.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            r#"
            [telemetry]
            port = "/dev/ttyACM0"
            baud = 115200

            [video]
            address = "10.0.0.7:5000"
            retry_backoff_ms = 250
            "#,
        );
        assert_eq!(
            config.telemetry.endpoint(),
            SerialEndpoint {
                port: "/dev/ttyACM0".to_string(),
                baud: 115200,
            }
        );
        assert_eq!(config.telemetry.stream_rate_hz, 10);
        assert_eq!(config.video.address, "10.0.0.7:5000");
        assert_eq!(
            config.orchestrator().video.retry_backoff,
            Some(Duration::from_millis(250))
        );
    }
}
