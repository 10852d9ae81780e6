//! Remote session/user count polling.
//!
//! One cancellable task per target server, started and stopped by the view
//! that needs the numbers. Each tick re-fetches the session list and user
//! count; results only ever overwrite the displayed snapshot (last write
//! wins), never drive a mutation. Results from a superseded or stopped
//! task are discarded by generation check.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, warn};

use super::emby::types::{EmbyTarget, PlaybackSession};
use super::emby::EmbyApi;

/// Latest numbers for one target, best-effort.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    /// Sessions currently playing a playlist-format asset.
    pub stream_sessions: usize,
    pub total_sessions: usize,
    pub user_count: usize,
    pub updated_at: i64,
}

fn snapshot_from(users: usize, sessions: &[PlaybackSession]) -> MonitorSnapshot {
    MonitorSnapshot {
        stream_sessions: sessions.iter().filter(|s| s.is_playing_stream()).count(),
        total_sessions: sessions.len(),
        user_count: users,
        updated_at: Utc::now().timestamp_millis(),
    }
}

struct ActiveTask {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct SessionMonitor {
    api: Arc<EmbyApi>,
    interval: Duration,
    tasks: RwLock<HashMap<String, ActiveTask>>,
    /// Which generation currently owns each target. Shared with the polling
    /// tasks so a replaced task's late write can be recognized and dropped.
    active: Arc<RwLock<HashMap<String, u64>>>,
    snapshots: Arc<RwLock<HashMap<String, MonitorSnapshot>>>,
    next_generation: std::sync::atomic::AtomicU64,
}

impl SessionMonitor {
    pub fn new(api: Arc<EmbyApi>, interval_secs: u64) -> Self {
        Self {
            api,
            interval: Duration::from_secs(interval_secs),
            tasks: RwLock::new(HashMap::new()),
            active: Arc::new(RwLock::new(HashMap::new())),
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            next_generation: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Start polling a target. An existing task for the same target is
    /// replaced; its in-flight results become stale and are dropped.
    pub async fn start(&self, target: EmbyTarget) {
        let key = target.base().to_string();
        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        self.active.write().await.insert(key.clone(), generation);

        let api = self.api.clone();
        let active = self.active.clone();
        let snapshots = self.snapshots.clone();
        let interval = self.interval;
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);

            loop {
                ticker.tick().await;

                let users = api.fetch_users(&target).await;
                let sessions = api.fetch_sessions(&target).await;

                let snapshot = match (users, sessions) {
                    (Ok(users), Ok(sessions)) => snapshot_from(users.len(), &sessions),
                    (Err(e), _) | (_, Err(e)) => {
                        // Best-effort telemetry: keep the stale snapshot.
                        warn!("Falha ao consultar sessões de {}: {}", task_key, e);
                        continue;
                    }
                };

                // Another task may have taken the target while this tick's
                // requests were in flight; its numbers win.
                if active.read().await.get(&task_key) != Some(&generation) {
                    break;
                }
                snapshots.write().await.insert(task_key.clone(), snapshot);
            }
        });

        let mut tasks = self.tasks.write().await;
        if let Some(previous) = tasks.insert(key.clone(), ActiveTask { generation, handle }) {
            previous.handle.abort();
        }
        info!("Monitor iniciado para {}", key);
    }

    /// Stop polling a target. Returns false when nothing was running.
    pub async fn stop(&self, server_url: &str) -> bool {
        let key = server_url.trim_end_matches('/');
        let mut tasks = self.tasks.write().await;
        match tasks.remove(key) {
            Some(task) => {
                self.active.write().await.remove(key);
                task.handle.abort();
                info!("Monitor encerrado para {}", key);
                true
            }
            None => false,
        }
    }

    pub async fn snapshot(&self, server_url: &str) -> Option<MonitorSnapshot> {
        let key = server_url.trim_end_matches('/');
        self.snapshots.read().await.get(key).copied()
    }

    pub async fn is_running(&self, server_url: &str) -> bool {
        let key = server_url.trim_end_matches('/');
        self.tasks.read().await.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::emby::types::NowPlayingItem;

    fn playing(path: &str) -> PlaybackSession {
        PlaybackSession {
            user_name: Some("user".to_string()),
            now_playing_item: Some(NowPlayingItem {
                name: None,
                path: Some(path.to_string()),
            }),
        }
    }

    #[test]
    fn test_snapshot_counts_stream_sessions() {
        let sessions = vec![
            playing("http://srv/lista.m3u8"),
            playing("/filmes/video.mkv"),
            playing("/tv/canal.M3U"),
        ];

        let snapshot = snapshot_from(12, &sessions);
        assert_eq!(snapshot.stream_sessions, 2);
        assert_eq!(snapshot.total_sessions, 3);
        assert_eq!(snapshot.user_count, 12);
    }
}
