//! Authentication gateway for remote Emby servers.
//!
//! Two mutually exclusive credential modes:
//!
//! - **Administrative**: the admin account from the panel configuration.
//!   Used for user, session and plugin management. Sends the synthetic
//!   `X-Emby-Authorization` header and includes the API key in the body.
//! - **Panel**: the fixed panel identity, used for channel pushes.
//!
//! No retry and no token caching here; callers own both decisions.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, USER_AGENT};
use std::time::Duration;
use tracing::{debug, error};

use super::types::{AuthRequest, AuthResponse, AuthSession, EmbyTarget};
use super::EmbyError;
use crate::config::EmbyCredentials;

/// Client identity sent with administrative authentication.
const EMBY_AUTHORIZATION: &str =
    r#"Emby UserId="", Client="Painel", Device="Painel", DeviceId="123", Version="1.0.0", Token="""#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    Administrative,
    Panel,
}

/// Resolve the username/password pair for a mode, without touching the
/// network. Missing configuration is an error before any request is made.
fn resolve_credentials(
    mode: CredentialMode,
    credentials: &EmbyCredentials,
) -> Result<(String, String), EmbyError> {
    match mode {
        CredentialMode::Administrative => {
            let username = credentials
                .admin_username
                .clone()
                .ok_or(EmbyError::Config("EMBY_ADMIN_USERNAME"))?;
            let password = credentials
                .admin_password
                .clone()
                .ok_or(EmbyError::Config("EMBY_ADMIN_PASSWORD"))?;
            Ok((username, password))
        }
        CredentialMode::Panel => {
            let password = credentials
                .panel_password
                .clone()
                .ok_or(EmbyError::Config("EMBY_PANEL_PASSWORD"))?;
            Ok((credentials.panel_username.clone(), password))
        }
    }
}

pub struct EmbyAuthenticator {
    http: reqwest::Client,
    credentials: EmbyCredentials,
    user_agent: String,
}

impl EmbyAuthenticator {
    pub fn new(credentials: EmbyCredentials, user_agent: &str, timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            credentials,
            user_agent: user_agent.to_string(),
        }
    }

    /// Authenticate against `target`, returning the access token and the
    /// remote id of the authenticated user.
    pub async fn authenticate(
        &self,
        target: &EmbyTarget,
        mode: CredentialMode,
    ) -> Result<AuthSession, EmbyError> {
        let (username, password) = resolve_credentials(mode, &self.credentials).map_err(|e| {
            error!("Credencial não configurada: {}", e);
            e
        })?;

        debug!("Autenticando no Emby como {}", username);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        if let Ok(ua) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, ua);
        }

        let body = AuthRequest {
            username,
            pw: password,
            api_key: match mode {
                CredentialMode::Administrative => {
                    headers.insert(
                        "X-Emby-Authorization",
                        HeaderValue::from_static(EMBY_AUTHORIZATION),
                    );
                    Some(target.api_key.clone())
                }
                CredentialMode::Panel => None,
            },
        };

        let response = self
            .http
            .post(target.auth_url())
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Autenticação rejeitada pelo Emby (HTTP {})", status);
            return Err(EmbyError::Auth {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let auth: AuthResponse =
            serde_json::from_str(&text).map_err(|e| EmbyError::Protocol(e.to_string()))?;

        let access_token = match auth.access_token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(EmbyError::NoToken),
        };

        Ok(AuthSession {
            access_token,
            user_id: auth.user.map(|user| user.id).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(admin: bool, panel: bool) -> EmbyCredentials {
        EmbyCredentials {
            admin_username: admin.then(|| "admin".to_string()),
            admin_password: admin.then(|| "secret".to_string()),
            panel_username: "painel".to_string(),
            panel_password: panel.then(|| "panelpw".to_string()),
        }
    }

    #[test]
    fn test_administrative_mode_requires_both_credentials() {
        let err =
            resolve_credentials(CredentialMode::Administrative, &credentials(false, true))
                .unwrap_err();
        assert!(matches!(err, EmbyError::Config(_)));

        let mut partial = credentials(true, true);
        partial.admin_password = None;
        let err = resolve_credentials(CredentialMode::Administrative, &partial).unwrap_err();
        assert!(matches!(err, EmbyError::Config("EMBY_ADMIN_PASSWORD")));

        let (user, pw) =
            resolve_credentials(CredentialMode::Administrative, &credentials(true, false))
                .unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pw, "secret");
    }

    #[test]
    fn test_panel_mode_uses_fixed_identity() {
        let (user, pw) =
            resolve_credentials(CredentialMode::Panel, &credentials(false, true)).unwrap();
        assert_eq!(user, "painel");
        assert_eq!(pw, "panelpw");

        let err =
            resolve_credentials(CredentialMode::Panel, &credentials(true, false)).unwrap_err();
        assert!(matches!(err, EmbyError::Config("EMBY_PANEL_PASSWORD")));
    }

    #[tokio::test]
    async fn test_unconfigured_admin_fails_without_network() {
        // Unroutable target: if the gateway tried the network the test
        // would not fail with Config.
        let authenticator =
            EmbyAuthenticator::new(credentials(false, false), "Painel/1.0.0", 1000);
        let target = EmbyTarget {
            server_url: "http://192.0.2.1:1".to_string(),
            api_key: "k".to_string(),
        };

        let err = authenticator
            .authenticate(&target, CredentialMode::Administrative)
            .await
            .unwrap_err();
        assert!(matches!(err, EmbyError::Config(_)));
    }
}
