//! Synchronization with the IPTV plugin's bookmark store.
//!
//! The upstream endpoint only does whole-list replacement: every mutation
//! here ships the complete desired end state, and push, subset delete and
//! delete-all all funnel through the same `replace_all` primitive. After a
//! successful replacement the driver re-fetches the list, because the server
//! gives no read-after-write guarantee, so an unconfirmed push is reported
//! as a failure instead of assumed fine.
//!
//! Mutations on one target are serialized through a per-target lock so two
//! concurrent replacements cannot silently clobber each other.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::emby::auth::CredentialMode;
use super::emby::types::{AuthSession, EmbyTarget, RemoteBookmark};
use super::emby::{EmbyApi, EmbyError};
use crate::models::WorkingChannel;

lazy_static! {
    static ref CHANNELS_PUSHED: IntCounter = register_int_counter!(
        "painel_channels_pushed_total",
        "Channels pushed to remote plugin configurations"
    )
    .unwrap();
    static ref SYNC_FAILURES: IntCounter = register_int_counter!(
        "painel_sync_failures_total",
        "Failed bookmark replacement operations"
    )
    .unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("nenhum canal selecionado")]
    EmptySelection,

    /// The replacement call itself was rejected.
    #[error("erro ao enviar canais para o Emby (HTTP {status})")]
    Push { status: u16 },

    /// The replacement was accepted but the confirming re-fetch failed;
    /// the remote state is unknown.
    #[error("envio aceito, mas a confirmação falhou: {0}")]
    ConfirmFailed(#[source] EmbyError),

    #[error(transparent)]
    Emby(#[from] EmbyError),
}

/// Result of a completed replacement: what we sent and what the server
/// reported holding afterwards.
#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub pushed: usize,
    pub confirmed: usize,
}

/// Build the plugin payload for the selected channels, tagged with the
/// remote user that owns them.
pub fn bookmarks_from_channels(
    channels: &[&WorkingChannel],
    user_id: &str,
) -> Vec<RemoteBookmark> {
    channels
        .iter()
        .map(|channel| RemoteBookmark {
            name: channel.record.display_name().to_string(),
            image: channel.record.tvg_logo.clone(),
            path: channel.record.url.clone(),
            protocol: channel.protocol.to_string(),
            user_id: user_id.to_string(),
        })
        .collect()
}

/// Remove the given positions from a remote list. Out-of-range indices are
/// ignored; order of the survivors is preserved.
pub fn reduce_list(list: Vec<RemoteBookmark>, remove: &[usize]) -> Vec<RemoteBookmark> {
    list.into_iter()
        .enumerate()
        .filter(|(index, _)| !remove.contains(index))
        .map(|(_, bookmark)| bookmark)
        .collect()
}

pub struct SyncDriver {
    api: Arc<EmbyApi>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncDriver {
    pub fn new(api: Arc<EmbyApi>) -> Self {
        Self {
            api,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// One mutation at a time per target server.
    async fn target_lock(&self, target: &EmbyTarget) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(target.base().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// The single underlying primitive: authenticate as the panel identity
    /// and replace the entire remote list, then re-fetch to confirm.
    async fn replace_all(
        &self,
        target: &EmbyTarget,
        session: &AuthSession,
        bookmarks: Vec<RemoteBookmark>,
    ) -> Result<SyncOutcome, SyncError> {
        let pushed = bookmarks.len();

        debug!("Enviando {} canais para {}", pushed, target.base());
        self.api
            .replace_bookmarks(target, session, &bookmarks)
            .await
            .map_err(|e| {
                SYNC_FAILURES.inc();
                match e {
                    EmbyError::Http { status, .. } => SyncError::Push { status },
                    other => SyncError::Emby(other),
                }
            })?;

        // The server exposes no read-after-write guarantee: confirm, and
        // fail visibly when confirmation is impossible.
        let confirmed = self
            .api
            .get_bookmarks(target, session)
            .await
            .map_err(|e| {
                warn!("Envio aceito mas releitura falhou em {}: {}", target.base(), e);
                SyncError::ConfirmFailed(e)
            })?
            .len();

        CHANNELS_PUSHED.inc_by(pushed as u64);
        info!(
            "Lista substituída em {}: {} enviados, {} confirmados",
            target.base(),
            pushed,
            confirmed
        );

        Ok(SyncOutcome { pushed, confirmed })
    }

    /// Push the selected working channels as the new remote list.
    pub async fn push(
        &self,
        target: &EmbyTarget,
        selected: &[&WorkingChannel],
    ) -> Result<SyncOutcome, SyncError> {
        if selected.is_empty() {
            return Err(SyncError::EmptySelection);
        }

        let lock = self.target_lock(target).await;
        let _guard = lock.lock().await;

        let session = self
            .api
            .authenticate(target, CredentialMode::Panel)
            .await?;
        let bookmarks = bookmarks_from_channels(selected, &session.user_id);

        self.replace_all(target, &session, bookmarks).await
    }

    /// Delete a subset of the remote list by replacing it with the list
    /// minus the given indices. An empty survivor list is a legal outcome.
    pub async fn delete_subset(
        &self,
        target: &EmbyTarget,
        remote_list: Vec<RemoteBookmark>,
        remove: &[usize],
    ) -> Result<SyncOutcome, SyncError> {
        let lock = self.target_lock(target).await;
        let _guard = lock.lock().await;

        let session = self
            .api
            .authenticate(target, CredentialMode::Panel)
            .await?;
        let reduced = reduce_list(remote_list, remove);

        self.replace_all(target, &session, reduced).await
    }

    /// Clear the remote list entirely.
    pub async fn delete_all(&self, target: &EmbyTarget) -> Result<SyncOutcome, SyncError> {
        let lock = self.target_lock(target).await;
        let _guard = lock.lock().await;

        let session = self
            .api
            .authenticate(target, CredentialMode::Panel)
            .await?;

        self.replace_all(target, &session, Vec::new()).await
    }

    /// Re-fetch the remote list for the "already on server" view. Callers
    /// degrade to an empty view with a warning on failure; this is not a
    /// mutation and takes no target lock.
    pub async fn refresh(&self, target: &EmbyTarget) -> Result<Vec<RemoteBookmark>, EmbyError> {
        let session = self
            .api
            .authenticate(target, CredentialMode::Panel)
            .await?;
        self.api.get_bookmarks(target, &session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelRecord, StreamProtocol};

    fn channel(tvg_name: &str, name: &str, url: &str) -> WorkingChannel {
        let mut wc = WorkingChannel::new(ChannelRecord {
            tvg_id: String::new(),
            tvg_name: tvg_name.to_string(),
            tvg_logo: format!("http://logo/{}", name),
            group_title: String::new(),
            name: name.to_string(),
            url: url.to_string(),
        });
        wc.protocol = StreamProtocol::Http;
        wc
    }

    fn bookmark(name: &str) -> RemoteBookmark {
        RemoteBookmark {
            name: name.to_string(),
            image: String::new(),
            path: format!("http://x/{}", name),
            protocol: "Http".to_string(),
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn test_payload_uses_display_name_fallback() {
        let with_tvg = channel("Globo HD", "Globo", "http://x/1");
        let without_tvg = channel("", "ESPN", "http://x/2");
        let channels: Vec<&WorkingChannel> = vec![&with_tvg, &without_tvg];

        let payload = bookmarks_from_channels(&channels, "user-9");
        assert_eq!(payload[0].name, "Globo HD");
        assert_eq!(payload[1].name, "ESPN");
        assert!(payload.iter().all(|b| b.user_id == "user-9"));
        assert_eq!(payload[0].path, "http://x/1");
        assert_eq!(payload[0].protocol, "Http");
    }

    #[test]
    fn test_reduce_list_removes_exactly_the_indices() {
        let list = vec![bookmark("a"), bookmark("b"), bookmark("c"), bookmark("d")];
        let reduced = reduce_list(list, &[1, 3]);
        let names: Vec<_> = reduced.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_reduce_list_ignores_out_of_range() {
        let list = vec![bookmark("a"), bookmark("b")];
        let reduced = reduce_list(list, &[7]);
        assert_eq!(reduced.len(), 2);
    }

    #[test]
    fn test_reduce_list_can_empty_the_list() {
        let list = vec![bookmark("a"), bookmark("b")];
        assert!(reduce_list(list, &[0, 1]).is_empty());
    }
}
