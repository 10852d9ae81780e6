//! Session monitor lifecycle endpoints.
//!
//! The dashboard starts the monitor when it opens, polls the status
//! endpoint for the latest numbers, and stops it when it closes; the
//! polling loop itself lives on the backend and dies with the stop call.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::emby::{validate_target, ApiError};
use crate::services::emby::types::EmbyTarget;
use crate::AppState;

/// POST /api/monitor/start
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    state.monitor.start(target).await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Monitoramento iniciado.",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerQuery {
    pub server_url: String,
}

/// POST /api/monitor/stop
pub async fn stop(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ServerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.server_url.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "URL do servidor é obrigatória." })),
        ));
    }

    let stopped = state.monitor.stop(&payload.server_url).await;

    Ok(Json(serde_json::json!({
        "success": true,
        "stopped": stopped,
    })))
}

/// POST /api/monitor/status - latest snapshot, possibly stale.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ServerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let running = state.monitor.is_running(&payload.server_url).await;
    let snapshot = state.monitor.snapshot(&payload.server_url).await;

    Ok(Json(serde_json::json!({
        "running": running,
        "snapshot": snapshot,
    })))
}
