//! Playlist import, working-set operations and channel synchronization.
//!
//! An import (file upload or URL download) parses the M3U into a new
//! workspace and returns its id; the selection endpoints operate on that
//! workspace; push/delete endpoints replace the remote plugin list from
//! it. Workspaces are transient: closing the view deletes them, and the
//! sweeper collects the abandoned ones.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::emby::{emby_error_response, validate_target, ApiError};
use crate::models::{StreamProtocol, WorkingChannel};
use crate::services::emby::types::EmbyTarget;
use crate::services::m3u::{parse_m3u, M3uError};
use crate::services::sync::SyncError;
use crate::services::workspace::ChannelWorkspace;
use crate::AppState;

// ============================================================================
// Responses
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelView<'a> {
    /// Position in the underlying sequence; selection endpoints take this.
    index: usize,
    #[serde(flatten)]
    channel: &'a WorkingChannel,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceView<'a> {
    workspace_id: Uuid,
    channels: Vec<ChannelView<'a>>,
    total: usize,
    filtered_total: usize,
    selected_count: usize,
    /// Aggregate selection of the filtered subsequence (the select-all
    /// checkbox state for the current view).
    all_selected: bool,
    groups: Vec<String>,
    /// Malformed playlist entries dropped on import; non-blocking warning.
    skipped: usize,
}

fn build_view(
    workspace_id: Uuid,
    workspace: &ChannelWorkspace,
    name: &str,
    group: &str,
) -> serde_json::Value {
    let filtered = workspace.filtered_view(name, group);
    let view = WorkspaceView {
        workspace_id,
        filtered_total: filtered.len(),
        channels: filtered
            .into_iter()
            .map(|(index, channel)| ChannelView { index, channel })
            .collect(),
        total: workspace.len(),
        selected_count: workspace.selected_count(),
        all_selected: workspace.filtered_all_selected(name, group),
        groups: workspace.groups(),
        skipped: workspace.skipped,
    };

    serde_json::to_value(&view).unwrap_or_default()
}

fn m3u_error_response(error: M3uError) -> ApiError {
    let status = match &error {
        M3uError::MissingHeader | M3uError::TooLarge { .. } => StatusCode::BAD_REQUEST,
        M3uError::Http(_) => StatusCode::BAD_REQUEST,
        M3uError::Transport(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(serde_json::json!({ "error": error.to_string() })))
}

fn sync_error_response(error: SyncError) -> ApiError {
    match error {
        SyncError::EmptySelection => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Nenhum canal selecionado." })),
        ),
        SyncError::Push { status } => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({
                "error": format!("Erro ao enviar canais para o Emby (HTTP {}).", status)
            })),
        ),
        SyncError::ConfirmFailed(e) => {
            tracing::error!("Confirmação pós-envio falhou: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "Envio aceito, mas não foi possível confirmar a lista no servidor."
                })),
            )
        }
        SyncError::Emby(e) => emby_error_response(e),
    }
}

fn workspace_not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Lista não encontrada ou expirada." })),
    )
}

async fn import(state: &AppState, text: &str) -> Result<Json<serde_json::Value>, ApiError> {
    let parsed = parse_m3u(text).map_err(m3u_error_response)?;

    if parsed.skipped > 0 {
        tracing::warn!("Import dropped {} malformed entries", parsed.skipped);
    }

    let workspace = ChannelWorkspace::new(parsed.channels, parsed.skipped);
    let id = state.workspaces.create(workspace).await;

    let view = state
        .workspaces
        .read(id, |ws| build_view(id, ws, "", ""))
        .await
        .ok_or_else(workspace_not_found)?;

    Ok(Json(view))
}

// ============================================================================
// Import
// ============================================================================

/// POST /api/emby/upload-m3u - multipart file upload.
pub async fn upload_m3u(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let max_bytes = state.config.max_m3u_size_mb * 1024 * 1024;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Upload inválido: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Erro ao enviar arquivo." })),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let data = field.bytes().await.map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Arquivo muito grande." })),
            )
        })?;

        if data.len() > max_bytes {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Arquivo muito grande." })),
            ));
        }

        let text = String::from_utf8_lossy(&data);
        return import(&state, &text).await;
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "Arquivo não enviado." })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

/// POST /api/emby/download-m3u - fetch the playlist from a URL.
pub async fn download_m3u(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DownloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.url.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "URL não informada." })),
        ));
    }

    let text = state
        .fetcher
        .fetch(&payload.url)
        .await
        .map_err(m3u_error_response)?;

    import(&state, &text).await
}

// ============================================================================
// Working set operations
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

/// GET /api/workspace/:id - the (optionally filtered) view.
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(filter): Query<FilterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let name = filter.name.unwrap_or_default();
    let group = filter.group.unwrap_or_default();

    let view = state
        .workspaces
        .read(id, |ws| build_view(id, ws, &name, &group))
        .await
        .ok_or_else(workspace_not_found)?;

    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub index: usize,
    /// Shift-style range selection from the previous anchor.
    #[serde(default)]
    pub extend: bool,
}

/// POST /api/workspace/:id/toggle
pub async fn toggle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .workspaces
        .modify(id, |ws| {
            let ok = ws.toggle(payload.index, payload.extend);
            (ok, ws.selected_count())
        })
        .await
        .ok_or_else(workspace_not_found)?;

    match result {
        (true, selected_count) => Ok(Json(serde_json::json!({
            "success": true,
            "selectedCount": selected_count,
        }))),
        (false, _) => Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Índice de canal inválido." })),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectAllRequest {
    /// When a filter is present, only the filtered subsequence is touched.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

/// POST /api/workspace/:id/select-all - the aggregate-driven control.
pub async fn select_all(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectAllRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.unwrap_or_default();
    let group = payload.group.unwrap_or_default();

    let selected_count = state
        .workspaces
        .modify(id, |ws| {
            if name.is_empty() && group.is_empty() {
                ws.toggle_select_all();
            } else {
                ws.toggle_filtered(&name, &group);
            }
            ws.selected_count()
        })
        .await
        .ok_or_else(workspace_not_found)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "selectedCount": selected_count,
    })))
}

/// POST /api/workspace/:id/invert
pub async fn invert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let selected_count = state
        .workspaces
        .modify(id, |ws| {
            ws.invert();
            ws.selected_count()
        })
        .await
        .ok_or_else(workspace_not_found)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "selectedCount": selected_count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SelectGroupRequest {
    pub group: String,
}

/// POST /api/workspace/:id/select-group
pub async fn select_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let selected_count = state
        .workspaces
        .modify(id, |ws| {
            ws.select_by_group(&payload.group);
            ws.selected_count()
        })
        .await
        .ok_or_else(workspace_not_found)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "selectedCount": selected_count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ProtocolRequest {
    pub index: usize,
    pub protocol: StreamProtocol,
}

/// POST /api/workspace/:id/protocol
pub async fn set_protocol(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProtocolRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ok = state
        .workspaces
        .modify(id, |ws| ws.set_protocol(payload.index, payload.protocol))
        .await
        .ok_or_else(workspace_not_found)?;

    if !ok {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Índice de canal inválido." })),
        ));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// DELETE /api/workspace/:id - discard the working set.
pub async fn delete_workspace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if state.workspaces.remove(id).await {
        Ok(Json(serde_json::json!({ "success": true })))
    } else {
        Err(workspace_not_found())
    }
}

// ============================================================================
// Synchronization
// ============================================================================

/// POST /api/workspace/:id/push - replace the remote list with the
/// selected channels.
pub async fn push(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    // The driver borrows the selection; the workspace itself stays put so
    // the operator can retry after a failure without re-importing.
    let selected: Vec<WorkingChannel> = state
        .workspaces
        .read(id, |ws| ws.selected().into_iter().cloned().collect())
        .await
        .ok_or_else(workspace_not_found)?;
    let refs: Vec<&WorkingChannel> = selected.iter().collect();

    let outcome = state
        .sync
        .push(&target, &refs)
        .await
        .map_err(sync_error_response)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Todos os canais enviados!",
        "pushed": outcome.pushed,
        "confirmed": outcome.confirmed,
    })))
}

/// POST /api/emby/channels - the "already on server" view.
///
/// Degrades to an empty list with a warning when the server cannot be
/// read; this view is informational, not a mutation.
pub async fn server_channels(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    match state.sync.refresh(&target).await {
        Ok(bookmarks) => {
            let total = bookmarks.len();
            Ok(Json(serde_json::json!({
                "bookmarks": bookmarks,
                "total": total,
            })))
        }
        Err(e) => {
            tracing::warn!("Falha ao buscar canais de {}: {}", target.base(), e);
            Ok(Json(serde_json::json!({
                "bookmarks": [],
                "total": 0,
                "warning": "Erro ao buscar canais do servidor.",
            })))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteChannelsRequest {
    #[serde(flatten)]
    pub target: EmbyTarget,
    /// Positions in the currently displayed remote list.
    pub indices: Vec<usize>,
}

/// POST /api/emby/delete-channels - remove a subset of the remote list.
pub async fn delete_channels(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DeleteChannelsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&payload.target)?;

    // Deletion needs the current list; unlike the display view this is a
    // mutation, so a failed read is a hard error.
    let remote_list = state
        .sync
        .refresh(&payload.target)
        .await
        .map_err(emby_error_response)?;

    let outcome = state
        .sync
        .delete_subset(&payload.target, remote_list, &payload.indices)
        .await
        .map_err(sync_error_response)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Canais excluídos!",
        "remaining": outcome.confirmed,
    })))
}

/// POST /api/emby/delete-all-channels - clear the remote list.
pub async fn delete_all_channels(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    let outcome = state
        .sync
        .delete_all(&target)
        .await
        .map_err(sync_error_response)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Todos os canais excluídos!",
        "remaining": outcome.confirmed,
    })))
}
