//! Emby REST API types.
//!
//! Wire types for the subset of the Emby server API the panel touches.
//! Emby serializes everything in PascalCase.

use serde::{Deserialize, Serialize};
use url::Url;

/// One remote Emby server as addressed by the panel: base URL plus the
/// server's API key. Credentials never travel with the target; they live
/// in the injected panel configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbyTarget {
    pub server_url: String,
    pub api_key: String,
}

impl EmbyTarget {
    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    pub fn is_valid(&self) -> bool {
        !self.api_key.is_empty() && Url::parse(self.base()).is_ok()
    }

    pub fn auth_url(&self) -> String {
        format!(
            "{}/emby/Users/AuthenticateByName?api_key={}",
            self.base(),
            urlencoding::encode(&self.api_key)
        )
    }

    pub fn users_url(&self) -> String {
        format!("{}/Users", self.base())
    }

    pub fn user_new_url(&self) -> String {
        format!("{}/emby/Users/New", self.base())
    }

    pub fn user_password_url(&self, user_id: &str) -> String {
        format!("{}/emby/Users/{}/Password", self.base(), user_id)
    }

    pub fn user_policy_url(&self, user_id: &str) -> String {
        format!("{}/emby/Users/{}/Policy", self.base(), user_id)
    }

    pub fn sessions_url(&self) -> String {
        format!(
            "{}/Sessions?IncludeAllSessionsIfAdmin=true&IsPlaying=true",
            self.base()
        )
    }

    pub fn plugins_url(&self) -> String {
        format!("{}/emby/Plugins", self.base())
    }

    pub fn plugin_config_url(&self, plugin_id: &str) -> String {
        format!("{}/emby/Plugins/{}/Configuration", self.base(), plugin_id)
    }

    pub fn install_package_url(&self, package_name: &str) -> String {
        format!(
            "{}/emby/Packages/Installed/{}",
            self.base(),
            urlencoding::encode(package_name)
        )
    }

    pub fn restart_url(&self) -> String {
        format!("{}/emby/System/Restart", self.base())
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Body of `POST /emby/Users/AuthenticateByName`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthRequest {
    pub username: String,
    pub pw: String,
    /// Only sent when authenticating with administrative credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthUser {
    #[serde(default)]
    pub id: String,
}

/// Outcome of a successful authentication: the short-lived token plus the
/// authenticated user's remote id.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: String,
}

// ============================================================================
// Users & policies
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub policy: UserPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPolicy {
    #[serde(default)]
    pub is_administrator: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub enable_live_tv_access: bool,
    #[serde(default)]
    pub enable_live_tv_management: bool,
    #[serde(default)]
    pub simultaneous_stream_limit: Option<i32>,
}

// ============================================================================
// Playback sessions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackSession {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub now_playing_item: Option<NowPlayingItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NowPlayingItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl PlaybackSession {
    /// Whether this session is playing a playlist-format asset
    /// (case-insensitive `.m3u` / `.m3u8` substring on the item path).
    pub fn is_playing_stream(&self) -> bool {
        self.now_playing_item
            .as_ref()
            .and_then(|item| item.path.as_ref())
            .map(|path| {
                let path = path.to_lowercase();
                path.contains(".m3u8") || path.contains(".m3u")
            })
            .unwrap_or(false)
    }
}

// ============================================================================
// Plugins & bookmarks
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub configuration_file_name: String,
}

/// The IPTV plugin configuration object. The bookmark array is the whole
/// state: a POST always replaces it entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginConfig {
    #[serde(default)]
    pub bookmarks: Vec<RemoteBookmark>,
}

/// One channel entry as stored by the IPTV plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteBookmark {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_urls_strip_trailing_slash() {
        let target = EmbyTarget {
            server_url: "http://emby.example.com:8096/".to_string(),
            api_key: "abc".to_string(),
        };
        assert_eq!(
            target.auth_url(),
            "http://emby.example.com:8096/emby/Users/AuthenticateByName?api_key=abc"
        );
        assert!(!target.users_url().contains("//Users"));
    }

    #[test]
    fn test_target_validation() {
        let ok = EmbyTarget {
            server_url: "http://emby.example.com:8096".to_string(),
            api_key: "abc".to_string(),
        };
        assert!(ok.is_valid());

        let bad_url = EmbyTarget {
            server_url: "emby.example.com".to_string(),
            api_key: "abc".to_string(),
        };
        assert!(!bad_url.is_valid());

        let no_key = EmbyTarget {
            server_url: "http://emby.example.com".to_string(),
            api_key: String::new(),
        };
        assert!(!no_key.is_valid());
    }

    #[test]
    fn test_auth_response_parsing() {
        let body = r#"{"AccessToken":"tok123","User":{"Id":"u1","Name":"painel"}}"#;
        let parsed: AuthResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token.as_deref(), Some("tok123"));
        assert_eq!(parsed.user.unwrap().id, "u1");

        let empty: AuthResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.access_token.is_none());
    }

    #[test]
    fn test_session_stream_detection() {
        let session = |path: Option<&str>| PlaybackSession {
            user_name: None,
            now_playing_item: path.map(|p| NowPlayingItem {
                name: None,
                path: Some(p.to_string()),
            }),
        };

        assert!(session(Some("/data/lista.M3U8")).is_playing_stream());
        assert!(session(Some("http://srv/canal.m3u")).is_playing_stream());
        assert!(!session(Some("/filmes/video.mkv")).is_playing_stream());
        assert!(!session(None).is_playing_stream());
    }

    #[test]
    fn test_bookmark_wire_names() {
        let bookmark = RemoteBookmark {
            name: "Canal".to_string(),
            image: "http://logo".to_string(),
            path: "http://x/1".to_string(),
            protocol: "Http".to_string(),
            user_id: "u1".to_string(),
        };
        let json = serde_json::to_value(&bookmark).unwrap();
        assert_eq!(json["Name"], "Canal");
        assert_eq!(json["UserId"], "u1");

        let config: PluginConfig = serde_json::from_str(r#"{"Bookmarks":[]}"#).unwrap();
        assert!(config.bookmarks.is_empty());
    }
}
