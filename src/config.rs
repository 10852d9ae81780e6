use std::env;

/// Credentials used against remote Emby servers.
///
/// Loaded once from the environment and injected into the auth gateway;
/// nothing else reads these variables directly.
#[derive(Debug, Clone)]
pub struct EmbyCredentials {
    /// Administrative account, required for user/session/plugin management.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Fixed panel identity used for channel pushes.
    pub panel_username: String,
    pub panel_password: Option<String>,
}

impl EmbyCredentials {
    pub fn from_env() -> Self {
        Self {
            admin_username: env::var("EMBY_ADMIN_USERNAME").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("EMBY_ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            panel_username: env::var("EMBY_PANEL_USERNAME")
                .unwrap_or_else(|_| "painel".to_string()),
            panel_password: env::var("EMBY_PANEL_PASSWORD").ok().filter(|v| !v.is_empty()),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub node_env: String,

    // PostgreSQL (panel accounts)
    pub database_url: String,
    pub db_max_connections: u32,

    // Remote Emby servers
    pub emby_credentials: EmbyCredentials,
    pub request_timeout_ms: u64,

    // Playlist import
    pub fetch_timeout_ms: u64,
    pub max_m3u_size_mb: usize,

    // Working sets
    pub workspace_ttl_seconds: u64,
    pub workspace_sweep_interval_secs: u64,

    // Session monitor
    pub monitor_interval_secs: u64,

    // Misc
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),
            node_env: env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string()),

            // PostgreSQL
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/painel".to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Remote Emby servers
            emby_credentials: EmbyCredentials::from_env(),
            request_timeout_ms: env::var("EMBY_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000), // 30 seconds

            // Playlist import
            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "300000".to_string())
                .parse()
                .unwrap_or(300_000), // 5 minutes

            max_m3u_size_mb: env::var("MAX_M3U_SIZE_MB")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .unwrap_or(200),

            // Working sets
            workspace_ttl_seconds: env::var("WORKSPACE_TTL_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600), // 1 hour

            workspace_sweep_interval_secs: env::var("WORKSPACE_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300), // 5 minutes

            // Session monitor
            monitor_interval_secs: env::var("MONITOR_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // Misc
            user_agent: env::var("USER_AGENT").unwrap_or_else(|_| "Painel/1.0.0".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
