// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::orchestrator::{Collaborators, Orchestrator};
use crate::application::video_ingest::video_feed_url;
use crate::infrastructure::config::load_config;
use crate::infrastructure::http_sources::{HttpRangingSource, HttpVideoSource};
use crate::infrastructure::jpeg_decoder::JpegDecoder;
use crate::infrastructure::mavlink_transport::MavlinkConnector;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::routes;
use crate::presentation::panel::LatestPanel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;

    // Adapters (infrastructure layer)
    let collaborators = Collaborators {
        connector: Arc::new(MavlinkConnector {
            system_id: config.telemetry.gcs_system_id,
            component_id: config.telemetry.gcs_component_id,
        }),
        video_source: Arc::new(HttpVideoSource::new()),
        decoder: Arc::new(JpegDecoder),
        ranging_source: Arc::new(HttpRangingSource::new(config.ranging.request_timeout())?),
    };

    let (sink, panel) = LatestPanel::new();
    let mut orchestrator = Orchestrator::new(collaborators, config.orchestrator(), Arc::new(sink));

    orchestrator.start_video(video_feed_url(&config.video.address)).await;
    orchestrator.start_ranging(config.ranging.host.clone()).await;
    if config.telemetry.auto_connect {
        // Failures land on the status display
        let _ = orchestrator.connect_telemetry(config.telemetry.endpoint()).await;
    }

    let state = Arc::new(AppState::new(orchestrator, panel));
    let router = routes(state.clone()).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting flightdeck on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for shutdown signal: {}", e);
            }
        })
        .await?;

    state.shutdown().await;
    Ok(())
}
