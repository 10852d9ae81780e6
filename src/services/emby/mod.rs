//! Emby server integration.
//!
//! Everything the panel does against a remote Emby server goes through this
//! module, split the same way the upstream protocol is:
//!
//! - **auth**: obtain a short-lived access token (`AuthenticateByName`),
//!   either as the administrative account or as the fixed panel identity.
//! - **client**: issue authenticated requests with the panel's fixed
//!   identification headers; no status-code interpretation.
//! - **api**: typed wrappers over the endpoints the routes consume
//!   (users, sessions, plugins, packages, restart, bookmarks).
//!
//! Tokens are not cached: every operation re-authenticates. The upstream
//! token has no expiry contract and operations are rare enough that the
//! extra round trip keeps the flow stateless.

pub mod api;
pub mod auth;
pub mod client;
pub mod types;

pub use api::{EmbyApi, PluginStatus, IPTV_PLUGIN_ID};
pub use auth::{CredentialMode, EmbyAuthenticator};
pub use client::EmbyClient;
pub use types::{
    AuthSession, EmbyTarget, EmbyUser, PlaybackSession, PluginConfig, RemoteBookmark,
};

/// Errors talking to a remote Emby server.
#[derive(Debug, thiserror::Error)]
pub enum EmbyError {
    /// Required credential missing from the panel configuration. Never
    /// reaches the network.
    #[error("configuração ausente: {0}")]
    Config(&'static str),

    /// The authentication call itself was rejected.
    #[error("falha na autenticação no Emby ({status})")]
    Auth { status: u16 },

    /// Authentication succeeded at the HTTP level but returned no token.
    #[error("token de acesso não retornado pelo Emby")]
    NoToken,

    /// A 2xx body that could not be decoded as the expected JSON.
    #[error("resposta inválida do Emby: {0}")]
    Protocol(String),

    /// Network-layer failure (connection refused, TLS, decompression,
    /// timeout). The source is kept so "server down" stays
    /// distinguishable from "data corrupted".
    #[error("erro de comunicação com o Emby: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx on an authenticated call where the operation needs success.
    #[error("HTTP {status} em {operation}")]
    Http {
        operation: &'static str,
        status: u16,
    },
}
