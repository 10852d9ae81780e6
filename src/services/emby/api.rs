//! Typed wrappers over the Emby endpoints the panel consumes.
//!
//! Every operation is authenticate-then-call: the upstream API accepts the
//! short-lived token only, so each wrapper obtains one first. Management
//! operations use administrative credentials; bookmark operations run as
//! the panel identity (callers pass the session they authenticated with).

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::auth::{CredentialMode, EmbyAuthenticator};
use super::client::EmbyClient;
use super::types::{
    AuthSession, EmbyTarget, EmbyUser, PlaybackSession, PluginConfig, PluginInfo, RemoteBookmark,
};
use super::EmbyError;

/// IPTV plugin identity: presence requires this exact triple.
pub const IPTV_PLUGIN_ID: &str = "c333f63b-83e9-48d2-8b9a-c5aba546fb1e";
pub const IPTV_PLUGIN_NAME: &str = "IPTV";
pub const IPTV_PLUGIN_CONFIG_FILE: &str = "MediaBrowser.Channels.IPTV.xml";

/// Reports plugin: presence requires the id only.
pub const REPORTS_PLUGIN_ID: &str = "2fe79c34-c9dc-4d94-9df2-2f3f36764414";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PluginStatus {
    pub iptv: bool,
    pub reports: bool,
}

impl PluginStatus {
    pub fn all_installed(&self) -> bool {
        self.iptv && self.reports
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub plugin: String,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

fn plugin_status(plugins: &[PluginInfo]) -> PluginStatus {
    let iptv = plugins.iter().any(|plugin| {
        plugin.id == IPTV_PLUGIN_ID
            && plugin.name == IPTV_PLUGIN_NAME
            && plugin.configuration_file_name == IPTV_PLUGIN_CONFIG_FILE
    });
    let reports = plugins.iter().any(|plugin| plugin.id == REPORTS_PLUGIN_ID);

    PluginStatus { iptv, reports }
}

pub struct EmbyApi {
    authenticator: EmbyAuthenticator,
    client: EmbyClient,
}

impl EmbyApi {
    pub fn new(authenticator: EmbyAuthenticator, client: EmbyClient) -> Self {
        Self {
            authenticator,
            client,
        }
    }

    pub async fn authenticate(
        &self,
        target: &EmbyTarget,
        mode: CredentialMode,
    ) -> Result<AuthSession, EmbyError> {
        self.authenticator.authenticate(target, mode).await
    }

    /// Decode a 2xx JSON body; anything else becomes the typed error.
    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, EmbyError> {
        let status = response.status();
        if !status.is_success() {
            return Err(EmbyError::Http {
                operation,
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("Resposta inesperada em {}: {}", operation, e);
            EmbyError::Protocol(e.to_string())
        })
    }

    /// List the server's user accounts (with nested policies).
    pub async fn fetch_users(&self, target: &EmbyTarget) -> Result<Vec<EmbyUser>, EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;
        let response = self
            .client
            .get(&target.users_url(), &session.access_token)
            .await?;
        Self::read_json(response, "Users").await
    }

    /// List sessions currently playing.
    pub async fn fetch_sessions(
        &self,
        target: &EmbyTarget,
    ) -> Result<Vec<PlaybackSession>, EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;
        let response = self
            .client
            .get(&target.sessions_url(), &session.access_token)
            .await?;
        Self::read_json(response, "Sessions").await
    }

    /// Check that the required plugins are installed.
    pub async fn check_plugins(&self, target: &EmbyTarget) -> Result<PluginStatus, EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;
        let response = self
            .client
            .get(&target.plugins_url(), &session.access_token)
            .await?;
        let plugins: Vec<PluginInfo> = Self::read_json(response, "Plugins").await?;

        Ok(plugin_status(&plugins))
    }

    /// Install named packages one by one. Individual failures are reported
    /// per package instead of aborting the batch.
    pub async fn install_packages(
        &self,
        target: &EmbyTarget,
        packages: &[String],
    ) -> Result<Vec<InstallResult>, EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;

        let mut results = Vec::with_capacity(packages.len());
        for package in packages {
            debug!("Instalando plugin {}", package);
            let outcome = self
                .client
                .post_empty(&target.install_package_url(package), &session.access_token)
                .await;

            results.push(match outcome {
                Ok(response) if response.status().is_success() => InstallResult {
                    plugin: package.clone(),
                    status: "success",
                    message: "Plugin instalado com sucesso".to_string(),
                    http_status: None,
                },
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    warn!("Falha ao instalar {} (HTTP {}): {}", package, status, body);
                    InstallResult {
                        plugin: package.clone(),
                        status: "error",
                        message: format!("Erro ao instalar: {}", body),
                        http_status: Some(status),
                    }
                }
                Err(e) => {
                    warn!("Falha ao instalar {}: {}", package, e);
                    InstallResult {
                        plugin: package.clone(),
                        status: "error",
                        message: format!("Erro interno: {}", e),
                        http_status: None,
                    }
                }
            });
        }

        Ok(results)
    }

    /// Restart the server. Emby answers 204 with no body on acceptance.
    pub async fn restart_server(&self, target: &EmbyTarget) -> Result<(), EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;
        let response = self
            .client
            .post_empty(&target.restart_url(), &session.access_token)
            .await?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 204 {
            Ok(())
        } else {
            Err(EmbyError::Http {
                operation: "System/Restart",
                status: status.as_u16(),
            })
        }
    }

    /// Create a remote user account. The creation endpoint does not echo
    /// the new id reliably, so the user list is re-read and matched by
    /// name afterwards.
    pub async fn create_user(
        &self,
        target: &EmbyTarget,
        name: &str,
    ) -> Result<EmbyUser, EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;

        let response = self
            .client
            .post_json(
                &target.user_new_url(),
                &session.access_token,
                serde_json::json!({ "Name": name }),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbyError::Http {
                operation: "Users/New",
                status: status.as_u16(),
            });
        }

        let response = self
            .client
            .get(&target.users_url(), &session.access_token)
            .await?;
        let users: Vec<EmbyUser> = Self::read_json(response, "Users").await?;

        users
            .into_iter()
            .find(|user| user.name == name)
            .ok_or_else(|| {
                EmbyError::Protocol("usuário criado mas não encontrado na listagem".to_string())
            })
    }

    /// Set a remote user's password (form-encoded endpoint).
    pub async fn set_user_password(
        &self,
        target: &EmbyTarget,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;

        let response = self
            .client
            .post_form(
                &target.user_password_url(user_id),
                &session.access_token,
                &[("NewPw", new_password)],
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbyError::Http {
                operation: "Users/Password",
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    /// Replace a remote user's policy object.
    pub async fn set_user_policy(
        &self,
        target: &EmbyTarget,
        user_id: &str,
        policy: serde_json::Value,
    ) -> Result<(), EmbyError> {
        let session = self
            .authenticate(target, CredentialMode::Administrative)
            .await?;

        let response = self
            .client
            .post_json(
                &target.user_policy_url(user_id),
                &session.access_token,
                policy,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbyError::Http {
                operation: "Users/Policy",
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    /// Read the IPTV plugin's bookmark list.
    pub async fn get_bookmarks(
        &self,
        target: &EmbyTarget,
        session: &AuthSession,
    ) -> Result<Vec<RemoteBookmark>, EmbyError> {
        let response = self
            .client
            .get(
                &target.plugin_config_url(IPTV_PLUGIN_ID),
                &session.access_token,
            )
            .await?;
        let config: PluginConfig = Self::read_json(response, "Plugins/Configuration").await?;

        Ok(config.bookmarks)
    }

    /// Replace the IPTV plugin's bookmark list wholesale. There is no
    /// partial update upstream: the posted array becomes the entire state.
    pub async fn replace_bookmarks(
        &self,
        target: &EmbyTarget,
        session: &AuthSession,
        bookmarks: &[RemoteBookmark],
    ) -> Result<(), EmbyError> {
        let body = serde_json::to_value(PluginConfig {
            bookmarks: bookmarks.to_vec(),
        })
        .map_err(|e| EmbyError::Protocol(e.to_string()))?;

        let response = self
            .client
            .post_json(
                &target.plugin_config_url(IPTV_PLUGIN_ID),
                &session.access_token,
                body,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbyError::Http {
                operation: "Plugins/Configuration",
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(id: &str, name: &str, config_file: &str) -> PluginInfo {
        serde_json::from_value(serde_json::json!({
            "Id": id,
            "Name": name,
            "ConfigurationFileName": config_file,
        }))
        .unwrap()
    }

    #[test]
    fn test_iptv_requires_exact_triple() {
        let exact = plugin(IPTV_PLUGIN_ID, IPTV_PLUGIN_NAME, IPTV_PLUGIN_CONFIG_FILE);
        assert!(plugin_status(&[exact]).iptv);

        // Right id, wrong name: not installed.
        let wrong_name = plugin(IPTV_PLUGIN_ID, "IPTV Fork", IPTV_PLUGIN_CONFIG_FILE);
        assert!(!plugin_status(&[wrong_name]).iptv);

        let wrong_file = plugin(IPTV_PLUGIN_ID, IPTV_PLUGIN_NAME, "Other.xml");
        assert!(!plugin_status(&[wrong_file]).iptv);
    }

    #[test]
    fn test_reports_requires_id_only() {
        let reports = plugin(REPORTS_PLUGIN_ID, "Qualquer Nome", "whatever.xml");
        let status = plugin_status(&[reports]);
        assert!(status.reports);
        assert!(!status.iptv);
        assert!(!status.all_installed());
    }

    #[test]
    fn test_empty_plugin_list() {
        let status = plugin_status(&[]);
        assert!(!status.iptv);
        assert!(!status.reports);
    }
}
