//! Panel account endpoints and the role cookie gate.
//!
//! These are the panel's own accounts (who may log into the panel and which
//! Emby server they manage), not the accounts on the remote server.

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::AccountInfo;
use crate::db::repository::accounts;
use crate::AppState;

const ROLE_COOKIE: &str = "userType";
const COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7; // 1 week

type ApiError = (StatusCode, Json<serde_json::Value>);

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Database error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Erro interno do servidor." })),
    )
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt) == expected_hash
}

fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Extract the role cookie from a request's headers.
fn role_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == ROLE_COOKIE).then(|| value.to_string())
    })
}

/// Gate for server-management routes: regular users are blocked, only
/// admin-role sessions pass.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match role_from_headers(request.headers()).as_deref() {
        Some("admin") => Ok(next.run(request).await),
        Some(_) => Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "Acesso restrito a administradores." })),
        )),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Sessão não autenticada." })),
        )),
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(rename = "type", default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub email: String,
    pub name: String,
    /// Empty or absent keeps the current password.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(rename = "type", default)]
    pub role: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = accounts::find_by_email(&state.pool, &payload.email)
        .await
        .map_err(internal_error)?;
    if existing.is_some() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Usuário já cadastrado." })),
        ));
    }

    let salt = new_salt();
    let account = accounts::insert(
        &state.pool,
        &accounts::NewAccount {
            email: payload.email,
            name: payload.name,
            password_hash: hash_password(&payload.password, &salt),
            salt,
            server_name: payload.server_name,
            server_url: payload.server_url,
            api_key: payload.api_key,
            role: payload.role.unwrap_or_else(|| "user".to_string()),
        },
    )
    .await
    .map_err(internal_error)?;

    Ok(Json(serde_json::json!({
        "message": "Usuário cadastrado com sucesso!",
        "user": AccountInfo::from(account),
    })))
}

/// POST /api/login - checks the password and sets the role cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let account = accounts::find_by_email(&state.pool, &payload.email)
        .await
        .map_err(internal_error)?
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Usuário não encontrado." })),
        ))?;

    if !verify_password(&payload.password, &account.salt, &account.password_hash) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Senha incorreta." })),
        ));
    }

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        ROLE_COOKIE, account.role, COOKIE_MAX_AGE_SECS
    );

    let body = Json(serde_json::json!({
        "message": "Login realizado com sucesso!",
        "user": AccountInfo::from(account),
    }));

    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

/// GET /api/logout - clears the role cookie.
pub async fn logout() -> impl IntoResponse {
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        ROLE_COOKIE
    );

    (
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "message": "Logout realizado com sucesso!" })),
    )
}

/// GET /api/users
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = accounts::list(&state.pool).await.map_err(internal_error)?;
    let users: Vec<AccountInfo> = rows.into_iter().map(AccountInfo::from).collect();

    Ok(Json(users))
}

/// PUT /api/users/:id
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = accounts::find_by_id(&state.pool, id)
        .await
        .map_err(internal_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Usuário não encontrado." })),
        ))?;

    // Only re-hash when a new password was actually supplied.
    let salt = new_salt();
    let hashed;
    let new_password = match payload.password.as_deref() {
        Some(password) if !password.is_empty() => {
            hashed = hash_password(password, &salt);
            Some((hashed.as_str(), salt.as_str()))
        }
        _ => None,
    };

    let updated = accounts::update(
        &state.pool,
        id,
        &payload.email,
        &payload.name,
        new_password,
        payload.server_name.as_deref(),
        payload.server_url.as_deref(),
        payload.api_key.as_deref(),
        payload.role.as_deref().unwrap_or(&existing.role),
    )
    .await
    .map_err(internal_error)?
    .ok_or((
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Usuário não encontrado." })),
    ))?;

    Ok(Json(serde_json::json!({
        "message": "Usuário atualizado com sucesso!",
        "user": AccountInfo::from(updated),
    })))
}

/// DELETE /api/users/:id
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = accounts::delete(&state.pool, id)
        .await
        .map_err(internal_error)?;

    if !deleted {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Erro ao excluir usuário." })),
        ));
    }

    Ok(Json(serde_json::json!({ "message": "Usuário excluído com sucesso!" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_password_roundtrip() {
        let salt = new_salt();
        let hash = hash_password("s3nha", &salt);
        assert!(verify_password("s3nha", &salt, &hash));
        assert!(!verify_password("outra", &salt, &hash));

        // Same password, different salt, different hash.
        let other = hash_password("s3nha", &new_salt());
        assert_ne!(hash, other);
    }

    #[test]
    fn test_role_cookie_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; userType=admin; baz=1"),
        );
        assert_eq!(role_from_headers(&headers).as_deref(), Some("admin"));

        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));
        assert_eq!(role_from_headers(&headers), None);

        headers.remove(header::COOKIE);
        assert_eq!(role_from_headers(&headers), None);
    }
}
