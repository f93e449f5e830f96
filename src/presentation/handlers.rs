// HTTP request handlers
use crate::application::telemetry_link::SUPPORTED_BAUD_RATES;
use crate::application::video_ingest::video_feed_url;
use crate::domain::connection::{ConnectionState, SerialEndpoint};
use crate::domain::errors::ConnectError;
use crate::infrastructure::jpeg_decoder::encode_jpeg;
use crate::infrastructure::ndjson_stream::stream_from_watch;
use crate::presentation::app_state::AppState;
use crate::presentation::panel::PanelSnapshot;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct VideoSourceRequest {
    pub address: String,
}

#[derive(Deserialize)]
pub struct RangingSourceRequest {
    pub host: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/panel", get(panel))
        .route("/panel/stream", get(panel_stream))
        .route("/video/frame", get(video_frame))
        .route("/video/source", post(set_video_source))
        .route("/ranging/source", post(set_ranging_source))
        .route("/telemetry/baud-rates", get(baud_rates))
        .route("/telemetry/connect", post(connect_telemetry))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn panel(State(state): State<Arc<AppState>>) -> Json<PanelSnapshot> {
    Json(state.panel.snapshot.borrow().clone())
}

/// One JSON line per panel change
pub async fn panel_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_from_watch(state.panel.snapshot.clone())
}

pub async fn video_frame(State(state): State<Arc<AppState>>) -> Response {
    let latest = state.panel.frame.borrow().clone();
    let Some(frame) = latest else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::task::spawn_blocking(move || encode_jpeg(&frame)).await {
        Ok(Ok(jpeg)) => ([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Cannot encode latest frame: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!("Frame encoder panicked: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn baud_rates() -> Json<[u32; 5]> {
    Json(SUPPORTED_BAUD_RATES)
}

pub async fn connect_telemetry(
    State(state): State<Arc<AppState>>,
    Json(endpoint): Json<SerialEndpoint>,
) -> Response {
    let mut guard = state.orchestrator.lock().await;
    let Some(orchestrator) = guard.as_mut() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    match orchestrator.connect_telemetry(endpoint).await {
        Ok(connection) => Json(connection).into_response(),
        Err(e) => {
            let status = match e {
                ConnectError::EmptyPort | ConnectError::InvalidBaud(_) => StatusCode::BAD_REQUEST,
                ConnectError::Unreachable { .. } | ConnectError::StreamRequest(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            let connection = ConnectionState::Error(e.to_string());
            (status, Json(json!({ "connection": connection }))).into_response()
        }
    }
}

pub async fn set_video_source(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VideoSourceRequest>,
) -> StatusCode {
    let mut guard = state.orchestrator.lock().await;
    let Some(orchestrator) = guard.as_mut() else {
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    let url = video_feed_url(&request.address);
    tracing::info!("Switching video feed to {}", url);
    orchestrator.start_video(url).await;
    StatusCode::ACCEPTED
}

pub async fn set_ranging_source(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RangingSourceRequest>,
) -> StatusCode {
    let mut guard = state.orchestrator.lock().await;
    let Some(orchestrator) = guard.as_mut() else {
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    tracing::info!("Switching ranging source to {}", request.host);
    orchestrator.start_ranging(request.host).await;
    StatusCode::ACCEPTED
}
