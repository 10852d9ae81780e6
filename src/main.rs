#![recursion_limit = "256"]

mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::services::emby::{EmbyApi, EmbyAuthenticator, EmbyClient};
use crate::services::m3u::PlaylistFetcher;
use crate::services::monitor::SessionMonitor;
use crate::services::sync::SyncDriver;
use crate::services::workspace::{start_workspace_sweeper, WorkspaceStore};
use sqlx::PgPool;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub workspaces: Arc<WorkspaceStore>,
    pub fetcher: PlaylistFetcher,
    pub emby: Arc<EmbyApi>,
    pub sync: SyncDriver,
    pub monitor: SessionMonitor,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "painel_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting Painel Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.node_env);

    // Initialize PostgreSQL connection pool (panel accounts)
    let pool = create_pool(&config).await?;
    tracing::info!("PostgreSQL connected");

    run_migrations(&pool).await?;

    // Emby integration: one authenticator/client pair shared by the API
    // wrappers, the sync driver and the session monitor.
    let authenticator = EmbyAuthenticator::new(
        config.emby_credentials.clone(),
        &config.user_agent,
        config.request_timeout_ms,
    );
    let client = EmbyClient::new(&config.user_agent, config.request_timeout_ms);
    let emby = Arc::new(EmbyApi::new(authenticator, client));

    let sync = SyncDriver::new(emby.clone());
    let monitor = SessionMonitor::new(emby.clone(), config.monitor_interval_secs);

    // Transient working sets, swept in the background
    let workspaces = Arc::new(WorkspaceStore::new(Duration::from_secs(
        config.workspace_ttl_seconds,
    )));
    tokio::spawn(start_workspace_sweeper(
        workspaces.clone(),
        config.workspace_sweep_interval_secs,
    ));

    let fetcher = PlaylistFetcher::new(
        &config.user_agent,
        config.fetch_timeout_ms,
        config.max_m3u_size_mb,
    );

    let max_upload_bytes = config.max_m3u_size_mb * 1024 * 1024;

    // Build application state
    let state = Arc::new(AppState {
        config,
        pool,
        workspaces,
        fetcher,
        emby,
        sync,
        monitor,
        start_time: Instant::now(),
    });

    // Channel management: admin-role sessions only
    let admin_routes = Router::new()
        .route("/api/emby/upload-m3u", post(routes::playlist::upload_m3u))
        .route("/api/emby/download-m3u", post(routes::playlist::download_m3u))
        .route(
            "/api/workspace/:id",
            get(routes::playlist::get_workspace).delete(routes::playlist::delete_workspace),
        )
        .route("/api/workspace/:id/toggle", post(routes::playlist::toggle))
        .route(
            "/api/workspace/:id/select-all",
            post(routes::playlist::select_all),
        )
        .route("/api/workspace/:id/invert", post(routes::playlist::invert))
        .route(
            "/api/workspace/:id/select-group",
            post(routes::playlist::select_group),
        )
        .route(
            "/api/workspace/:id/protocol",
            post(routes::playlist::set_protocol),
        )
        .route("/api/workspace/:id/push", post(routes::playlist::push))
        .route("/api/emby/channels", post(routes::playlist::server_channels))
        .route(
            "/api/emby/delete-channels",
            post(routes::playlist::delete_channels),
        )
        .route(
            "/api/emby/delete-all-channels",
            post(routes::playlist::delete_all_channels),
        )
        .route(
            "/api/emby/install-plugins",
            post(routes::emby::install_plugins),
        )
        .route(
            "/api/emby/restart-server",
            post(routes::emby::restart_server),
        )
        .route_layer(middleware::from_fn(routes::accounts::require_admin));

    // Build router
    let app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Panel accounts
        .route("/api/register", post(routes::accounts::register))
        .route("/api/login", post(routes::accounts::login))
        .route("/api/logout", get(routes::accounts::logout))
        .route("/api/users", get(routes::accounts::list_accounts))
        .route(
            "/api/users/:id",
            put(routes::accounts::update_account).delete(routes::accounts::delete_account),
        )
        // Emby proxy (dashboard, both roles)
        .route("/api/emby/authenticate", post(routes::emby::authenticate))
        .route("/api/emby/users", post(routes::emby::users))
        .route("/api/emby/sessions", post(routes::emby::sessions))
        .route("/api/emby/check-plugin", post(routes::emby::check_plugin))
        .route("/api/emby/create-user", post(routes::emby::create_user))
        .route("/api/emby/update-user", post(routes::emby::update_user))
        // Session monitor
        .route("/api/monitor/start", post(routes::monitor::start))
        .route("/api/monitor/stop", post(routes::monitor::stop))
        .route("/api/monitor/status", post(routes::monitor::status))
        .merge(admin_routes)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
