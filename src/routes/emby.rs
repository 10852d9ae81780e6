//! Proxy endpoints for remote Emby servers.
//!
//! The browser only ever talks to these; Emby credentials stay on the
//! backend. Every handler receives the target server (URL + API key) in
//! the request body and authenticates upstream per call.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::services::emby::auth::CredentialMode;
use crate::services::emby::types::EmbyTarget;
use crate::services::emby::EmbyError;
use crate::AppState;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// Map an upstream failure to a response the panel can show. Config
/// problems are logged in detail but surfaced as a generic auth failure,
/// since the operator cannot fix the backend's environment from the browser.
pub fn emby_error_response(error: EmbyError) -> ApiError {
    match error {
        EmbyError::Config(variable) => {
            tracing::error!("Credencial não configurada no backend: {}", variable);
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Falha na autenticação no Emby." })),
            )
        }
        EmbyError::Auth { status } => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": format!("Falha na autenticação no Emby ({}).", status)
            })),
        ),
        EmbyError::NoToken => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Token de acesso não retornado pelo Emby." })),
        ),
        EmbyError::Protocol(detail) => {
            tracing::error!("Resposta inválida do Emby: {}", detail);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Erro ao processar resposta do Emby." })),
            )
        }
        EmbyError::Transport(e) => {
            tracing::error!("Falha de comunicação com o Emby: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "Servidor Emby não está acessível. Verifique se o Emby está rodando e acessível."
                })),
            )
        }
        EmbyError::Http { operation, status } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(serde_json::json!({
                "error": format!("Erro ao consultar {} no Emby (HTTP {}).", operation, status)
            })),
        ),
    }
}

pub fn validate_target(target: &EmbyTarget) -> Result<(), ApiError> {
    if target.is_valid() {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "URL do servidor e API Key são obrigatórios." })),
        ))
    }
}

/// POST /api/emby/authenticate - panel-identity login, token passthrough.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    let session = state
        .emby
        .authenticate(&target, CredentialMode::Panel)
        .await
        .map_err(emby_error_response)?;

    Ok(Json(serde_json::json!({
        "accessToken": session.access_token,
        "userId": session.user_id,
    })))
}

/// POST /api/emby/users - list the remote server's accounts.
pub async fn users(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    let users = state
        .emby
        .fetch_users(&target)
        .await
        .map_err(emby_error_response)?;

    Ok(Json(users))
}

/// POST /api/emby/sessions - active sessions plus how many are playing
/// playlist streams.
pub async fn sessions(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    let sessions = state
        .emby
        .fetch_sessions(&target)
        .await
        .map_err(emby_error_response)?;

    let iptv_count = sessions.iter().filter(|s| s.is_playing_stream()).count();

    Ok(Json(serde_json::json!({
        "iptvCount": iptv_count,
        "totalSessions": sessions.len(),
        "sessions": sessions,
    })))
}

/// POST /api/emby/check-plugin - presence check for the required plugins.
///
/// Fail-soft by design: any upstream problem reports `status: "fail"` so
/// the dashboard shows the warning instead of an error page.
pub async fn check_plugin(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    match state.emby.check_plugins(&target).await {
        Ok(status) => Ok(Json(serde_json::json!({
            "status": if status.all_installed() { "ok" } else { "fail" },
            "plugins": status,
        }))),
        Err(e) => {
            tracing::error!("Verificação de plugins falhou: {}", e);
            Ok(Json(serde_json::json!({
                "status": "fail",
                "error": "Erro interno na verificação de plugins.",
            })))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPluginsRequest {
    #[serde(flatten)]
    pub target: EmbyTarget,
    pub plugins: Vec<String>,
}

/// POST /api/emby/install-plugins - install named packages, one by one.
pub async fn install_plugins(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InstallPluginsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&payload.target)?;

    if payload.plugins.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Lista de plugins é obrigatória." })),
        ));
    }

    let results = state
        .emby
        .install_packages(&payload.target, &payload.plugins)
        .await
        .map_err(emby_error_response)?;

    let all_success = results.iter().all(|result| result.status == "success");

    Ok(Json(serde_json::json!({
        "success": all_success,
        "results": results,
        "message": if all_success {
            "Todos os plugins foram instalados com sucesso"
        } else {
            "Alguns plugins falharam na instalação"
        },
    })))
}

/// Policy knobs the panel exposes; everything else in the policy object
/// is fixed to the values the panel always provisions.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPolicyOptions {
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub enable_live_tv_access: bool,
    #[serde(default)]
    pub enable_live_tv_management: bool,
    #[serde(default)]
    pub simultaneous_stream_limit: i32,
}

/// The full policy object Emby expects on POST; partial updates reset the
/// omitted fields, so the whole shape is always sent.
fn build_user_policy(options: &UserPolicyOptions) -> serde_json::Value {
    serde_json::json!({
        "IsAdministrator": false,
        "IsHidden": options.is_hidden,
        "IsHiddenRemotely": true,
        "IsHiddenFromUnusedDevices": true,
        "IsDisabled": options.is_disabled,
        "LockedOutDate": 0,
        "AllowTagOrRating": false,
        "BlockedTags": [],
        "IsTagBlockingModeInclusive": false,
        "IncludeTags": [],
        "EnableUserPreferenceAccess": true,
        "AccessSchedules": [],
        "BlockUnratedItems": [],
        "EnableRemoteControlOfOtherUsers": false,
        "EnableSharedDeviceControl": true,
        "EnableRemoteAccess": true,
        "EnableLiveTvManagement": options.enable_live_tv_management,
        "EnableLiveTvAccess": options.enable_live_tv_access,
        "EnableMediaPlayback": true,
        "EnableAudioPlaybackTranscoding": true,
        "EnableVideoPlaybackTranscoding": true,
        "EnablePlaybackRemuxing": true,
        "EnableContentDeletion": false,
        "RestrictedFeatures": [],
        "EnableContentDeletionFromFolders": [],
        "EnableContentDownloading": false,
        "EnableSubtitleDownloading": false,
        "EnableSubtitleManagement": false,
        "EnableSyncTranscoding": true,
        "EnableMediaConversion": false,
        "EnabledChannels": [],
        "EnableAllChannels": true,
        "EnabledFolders": [],
        "EnableAllFolders": true,
        "InvalidLoginAttemptCount": 0,
        "EnablePublicSharing": false,
        "RemoteClientBitrateLimit": 0,
        "AuthenticationProviderId": "Emby.Server.Implementations.Library.DefaultAuthenticationProvider",
        "ExcludedSubFolders": [],
        "SimultaneousStreamLimit": options.simultaneous_stream_limit,
        "EnabledDevices": [],
        "EnableAllDevices": true,
        "AllowCameraUpload": false,
        "AllowSharingPersonalItems": false
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub target: EmbyTarget,
    pub name: String,
    pub password: String,
    #[serde(flatten)]
    pub options: UserPolicyOptions,
}

/// POST /api/emby/create-user - provision a remote account: create, set
/// the password, then apply the panel's policy.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&payload.target)?;

    if payload.name.is_empty() || payload.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Nome e senha são obrigatórios." })),
        ));
    }

    let user = state
        .emby
        .create_user(&payload.target, &payload.name)
        .await
        .map_err(emby_error_response)?;

    // From here on the account exists; report partial failures as such so
    // the operator knows what still needs fixing.
    if let Err(e) = state
        .emby
        .set_user_password(&payload.target, &user.id, &payload.password)
        .await
    {
        tracing::error!("Senha não aplicada ao usuário {}: {}", user.id, e);
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": "Usuário criado, mas erro ao definir senha." })),
        ));
    }

    if let Err(e) = state
        .emby
        .set_user_policy(&payload.target, &user.id, build_user_policy(&payload.options))
        .await
    {
        tracing::error!("Política não aplicada ao usuário {}: {}", user.id, e);
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(
                serde_json::json!({ "error": "Usuário criado, mas erro ao atualizar políticas." }),
            ),
        ));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Usuário criado com sucesso!",
        "user": user,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    pub target: EmbyTarget,
    pub user_id: String,
    /// Absent or empty keeps the current password.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub options: UserPolicyOptions,
}

/// POST /api/emby/update-user - reapply policy and optionally change the
/// password of an existing remote account.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&payload.target)?;

    if payload.user_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Identificador do usuário é obrigatório." })),
        ));
    }

    state
        .emby
        .set_user_policy(
            &payload.target,
            &payload.user_id,
            build_user_policy(&payload.options),
        )
        .await
        .map_err(emby_error_response)?;

    if let Some(password) = payload.password.as_deref() {
        if !password.is_empty() {
            if let Err(e) = state
                .emby
                .set_user_password(&payload.target, &payload.user_id, password)
                .await
            {
                tracing::error!("Senha não alterada para {}: {}", payload.user_id, e);
                return Err((
                    StatusCode::BAD_GATEWAY,
                    Json(serde_json::json!({
                        "error": "Usuário atualizado, mas erro ao alterar senha."
                    })),
                ));
            }
        }
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Usuário atualizado com sucesso!",
    })))
}

/// POST /api/emby/restart-server
pub async fn restart_server(
    State(state): State<Arc<AppState>>,
    Json(target): Json<EmbyTarget>,
) -> Result<impl IntoResponse, ApiError> {
    validate_target(&target)?;

    state
        .emby
        .restart_server(&target)
        .await
        .map_err(emby_error_response)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Comando de reinicialização enviado com sucesso. O servidor será reiniciado em alguns segundos.",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_reflects_form_options() {
        let policy = build_user_policy(&UserPolicyOptions {
            is_hidden: true,
            is_disabled: false,
            enable_live_tv_access: true,
            enable_live_tv_management: false,
            simultaneous_stream_limit: 2,
        });

        assert_eq!(policy["IsHidden"], true);
        assert_eq!(policy["EnableLiveTvAccess"], true);
        assert_eq!(policy["EnableLiveTvManagement"], false);
        assert_eq!(policy["SimultaneousStreamLimit"], 2);
        // Accounts provisioned by the panel are never administrators.
        assert_eq!(policy["IsAdministrator"], false);
    }

    #[test]
    fn test_validate_target_rejects_bad_input() {
        let bad = EmbyTarget {
            server_url: String::new(),
            api_key: String::new(),
        };
        assert!(validate_target(&bad).is_err());

        let ok = EmbyTarget {
            server_url: "http://emby:8096".to_string(),
            api_key: "k".to_string(),
        };
        assert!(validate_target(&ok).is_ok());
    }
}
