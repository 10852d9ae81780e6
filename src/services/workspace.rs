//! Channel working sets.
//!
//! One workspace holds the channels of one imported playlist while the
//! operator shapes a selection. Workspaces are transient: nothing here is
//! persisted, and a sweeper drops sets the operator walked away from. The
//! remote server's plugin configuration stays the sole source of truth.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time;
use uuid::Uuid;

use crate::models::{ChannelRecord, StreamProtocol, WorkingChannel};

/// The selection model over one imported playlist.
///
/// The channel sequence keeps playlist order and is never reordered or
/// truncated by filtering; view filters only restrict which entries an
/// operation touches.
#[derive(Debug)]
pub struct ChannelWorkspace {
    channels: Vec<WorkingChannel>,
    /// Anchor of the last toggle, for shift-style range selection.
    last_touched: Option<usize>,
    /// Directive lines the parser dropped, surfaced as a warning.
    pub skipped: usize,
}

impl ChannelWorkspace {
    pub fn new(records: Vec<ChannelRecord>, skipped: usize) -> Self {
        Self {
            channels: records.into_iter().map(WorkingChannel::new).collect(),
            last_touched: None,
            skipped,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[WorkingChannel] {
        &self.channels
    }

    pub fn selected(&self) -> Vec<&WorkingChannel> {
        self.channels.iter().filter(|c| c.selected).collect()
    }

    pub fn selected_count(&self) -> usize {
        self.channels.iter().filter(|c| c.selected).count()
    }

    /// Distinct group labels in playlist order, empty labels excluded.
    pub fn groups(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for channel in &self.channels {
            let group = &channel.record.group_title;
            if !group.is_empty() && !seen.contains(group) {
                seen.push(group.clone());
            }
        }
        seen
    }

    /// Flip one channel's selection. With `extend`, every channel between
    /// the previous anchor and `index` (inclusive) is set selected (not
    /// flipped), mirroring shift-click. The anchor always moves to `index`.
    pub fn toggle(&mut self, index: usize, extend: bool) -> bool {
        if index >= self.channels.len() {
            return false;
        }

        match (extend, self.last_touched) {
            (true, Some(anchor)) => {
                let (start, end) = if anchor <= index {
                    (anchor, index)
                } else {
                    (index, anchor)
                };
                for channel in &mut self.channels[start..=end] {
                    channel.selected = true;
                }
            }
            _ => {
                self.channels[index].selected = !self.channels[index].selected;
            }
        }

        self.last_touched = Some(index);
        true
    }

    pub fn select_all(&mut self) {
        for channel in &mut self.channels {
            channel.selected = true;
        }
    }

    pub fn deselect_all(&mut self) {
        for channel in &mut self.channels {
            channel.selected = false;
        }
    }

    /// The single select-all control: deselect everything when everything
    /// is selected, select everything otherwise.
    pub fn toggle_select_all(&mut self) {
        if self.channels.iter().all(|c| c.selected) {
            self.deselect_all();
        } else {
            self.select_all();
        }
    }

    pub fn invert(&mut self) {
        for channel in &mut self.channels {
            channel.selected = !channel.selected;
        }
    }

    /// Select every channel whose group label matches exactly. Channels
    /// outside the group are left alone.
    pub fn select_by_group(&mut self, group: &str) {
        for channel in &mut self.channels {
            if channel.record.group_title == group {
                channel.selected = true;
            }
        }
    }

    pub fn set_protocol(&mut self, index: usize, protocol: StreamProtocol) -> bool {
        match self.channels.get_mut(index) {
            Some(channel) => {
                channel.protocol = protocol;
                true
            }
            None => false,
        }
    }

    fn matches_filter(channel: &WorkingChannel, name: &str, group: &str) -> bool {
        let name_ok = name.is_empty()
            || channel
                .record
                .display_name()
                .to_lowercase()
                .contains(&name.to_lowercase());
        let group_ok = group.is_empty() || channel.record.group_title == group;
        name_ok && group_ok
    }

    /// The filtered view: original indices plus channels matching a
    /// case-insensitive name substring and an exact group (empty filter
    /// matches all). Purely a view; the underlying sequence is untouched.
    pub fn filtered_view(&self, name: &str, group: &str) -> Vec<(usize, &WorkingChannel)> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, channel)| Self::matches_filter(channel, name, group))
            .collect()
    }

    /// Aggregate selection state of the filtered subsequence only, which is
    /// what the view's select-all checkbox reflects.
    pub fn filtered_all_selected(&self, name: &str, group: &str) -> bool {
        let view = self.filtered_view(name, group);
        !view.is_empty() && view.iter().all(|(_, channel)| channel.selected)
    }

    /// The view's select-all checkbox: mutates only channels inside the
    /// current filter, based on the filtered aggregate state.
    pub fn toggle_filtered(&mut self, name: &str, group: &str) {
        let target = !self.filtered_all_selected(name, group);
        for channel in &mut self.channels {
            if Self::matches_filter(channel, name, group) {
                channel.selected = target;
            }
        }
    }
}

struct StoredWorkspace {
    workspace: ChannelWorkspace,
    touched_at: Instant,
}

/// In-memory store of live working sets, keyed by workspace id.
pub struct WorkspaceStore {
    inner: RwLock<HashMap<Uuid, StoredWorkspace>>,
    ttl: Duration,
}

impl WorkspaceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self, workspace: ChannelWorkspace) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.insert(
            id,
            StoredWorkspace {
                workspace,
                touched_at: Instant::now(),
            },
        );
        id
    }

    /// Read access to one workspace; `None` when it expired or never was.
    pub async fn read<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&ChannelWorkspace) -> R,
    ) -> Option<R> {
        let guard = self.inner.read().await;
        guard.get(&id).map(|stored| f(&stored.workspace))
    }

    /// Mutate one workspace, refreshing its expiry.
    pub async fn modify<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ChannelWorkspace) -> R,
    ) -> Option<R> {
        let mut guard = self.inner.write().await;
        guard.get_mut(&id).map(|stored| {
            stored.touched_at = Instant::now();
            f(&mut stored.workspace)
        })
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drop workspaces idle past the TTL; returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, stored| stored.touched_at.elapsed() < self.ttl);
        before - guard.len()
    }
}

/// Background sweeper for abandoned working sets.
///
/// Spawn once at startup; runs forever at the configured interval.
pub async fn start_workspace_sweeper(store: Arc<WorkspaceStore>, interval_secs: u64) {
    tracing::info!("Starting workspace sweeper (interval: {}s)", interval_secs);

    let mut interval = time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // first tick fires immediately, nothing to sweep yet

    loop {
        interval.tick().await;
        let dropped = store.sweep().await;
        if dropped > 0 {
            tracing::info!("Sweeper: dropped {} expired workspaces", dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, group: &str) -> ChannelRecord {
        ChannelRecord {
            tvg_id: String::new(),
            tvg_name: String::new(),
            tvg_logo: String::new(),
            group_title: group.to_string(),
            name: name.to_string(),
            url: format!("http://x/{}", name),
        }
    }

    fn workspace(entries: &[(&str, &str)]) -> ChannelWorkspace {
        ChannelWorkspace::new(
            entries.iter().map(|(n, g)| record(n, g)).collect(),
            0,
        )
    }

    fn selection(ws: &ChannelWorkspace) -> Vec<bool> {
        ws.channels().iter().map(|c| c.selected).collect()
    }

    #[test]
    fn test_import_selects_everything() {
        let ws = workspace(&[("a", "G"), ("b", "G")]);
        assert_eq!(selection(&ws), vec![true, true]);
        assert_eq!(ws.selected_count(), 2);
    }

    #[test]
    fn test_toggle_flips_one() {
        let mut ws = workspace(&[("a", "G"), ("b", "G")]);
        assert!(ws.toggle(1, false));
        assert_eq!(selection(&ws), vec![true, false]);
        assert!(ws.toggle(1, false));
        assert_eq!(selection(&ws), vec![true, true]);
        assert!(!ws.toggle(9, false));
    }

    #[test]
    fn test_extend_selects_inclusive_range() {
        let mut ws = workspace(&[("a", ""), ("b", ""), ("c", ""), ("d", ""), ("e", ""), ("f", "")]);
        ws.deselect_all();

        // Anchor at 2, then shift-click 5: 2..=5 all set true regardless
        // of prior state.
        ws.toggle(2, false);
        ws.toggle(5, true);
        assert_eq!(selection(&ws), vec![false, false, true, true, true, true]);
    }

    #[test]
    fn test_extend_works_backwards_and_reanchors() {
        let mut ws = workspace(&[("a", ""), ("b", ""), ("c", ""), ("d", "")]);
        ws.deselect_all();

        ws.toggle(3, false);
        ws.toggle(1, true);
        assert_eq!(selection(&ws), vec![false, true, true, true]);

        // The anchor moved to 1, so extending to 0 covers 0..=1 only.
        ws.deselect_all();
        ws.toggle(0, true);
        assert_eq!(selection(&ws), vec![true, true, false, false]);
    }

    #[test]
    fn test_extend_without_anchor_is_plain_toggle() {
        let mut ws = workspace(&[("a", ""), ("b", "")]);
        ws.toggle(0, true);
        assert_eq!(selection(&ws), vec![false, true]);
    }

    #[test]
    fn test_toggle_select_all_follows_aggregate() {
        let mut ws = workspace(&[("a", ""), ("b", ""), ("c", "")]);

        // Everything selected: the control deselects.
        ws.toggle_select_all();
        assert_eq!(ws.selected_count(), 0);

        // Mixed state: the control selects everything.
        ws.toggle(1, false);
        ws.toggle_select_all();
        assert_eq!(ws.selected_count(), 3);
    }

    #[test]
    fn test_invert_twice_is_identity() {
        let mut ws = workspace(&[("a", ""), ("b", ""), ("c", "")]);
        ws.toggle(1, false);
        let original = selection(&ws);

        ws.invert();
        assert_eq!(selection(&ws), vec![false, true, false]);
        ws.invert();
        assert_eq!(selection(&ws), original);
    }

    #[test]
    fn test_select_by_group_never_deselects() {
        let mut ws = workspace(&[("a", "News"), ("b", "Sports"), ("c", "News")]);
        ws.deselect_all();
        ws.toggle(1, false); // select the Sports channel

        ws.select_by_group("News");
        assert_eq!(selection(&ws), vec![true, true, true]);

        // Exact match only.
        ws.deselect_all();
        ws.select_by_group("news");
        assert_eq!(ws.selected_count(), 0);
    }

    #[test]
    fn test_set_protocol() {
        let mut ws = workspace(&[("a", "")]);
        assert!(ws.set_protocol(0, StreamProtocol::Rtmp));
        assert_eq!(ws.channels()[0].protocol, StreamProtocol::Rtmp);
        assert!(!ws.set_protocol(5, StreamProtocol::Http));
    }

    #[test]
    fn test_filtered_view_is_nondestructive() {
        let ws = workspace(&[("Globo HD", "TV"), ("ESPN", "Sports"), ("globo news", "TV")]);

        let view = ws.filtered_view("globo", "");
        assert_eq!(
            view.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 2]
        );

        let view = ws.filtered_view("globo", "TV");
        assert_eq!(view.len(), 2);
        let view = ws.filtered_view("", "Sports");
        assert_eq!(view.len(), 1);

        // Underlying sequence untouched.
        assert_eq!(ws.len(), 3);
    }

    #[test]
    fn test_filter_uses_display_name() {
        let mut ws = workspace(&[("canal um", "")]);
        ws.modify_tvg_name(0, "Primeiro");
        assert_eq!(ws.filtered_view("primeiro", "").len(), 1);
        assert!(ws.filtered_view("canal", "").is_empty());
    }

    #[test]
    fn test_toggle_filtered_touches_only_the_view() {
        let mut ws = workspace(&[("Globo", "TV"), ("ESPN", "Sports"), ("Globo News", "TV")]);
        ws.deselect_all();

        // Mixed filtered state: selects the filtered subsequence.
        ws.toggle_filtered("globo", "");
        assert_eq!(selection(&ws), vec![true, false, true]);
        assert!(ws.filtered_all_selected("globo", ""));

        // All filtered selected: deselects them, still leaving ESPN alone.
        ws.toggle(1, false);
        ws.toggle_filtered("globo", "");
        assert_eq!(selection(&ws), vec![false, true, false]);
    }

    #[test]
    fn test_groups_are_distinct_in_order() {
        let ws = workspace(&[("a", "TV"), ("b", ""), ("c", "Sports"), ("d", "TV")]);
        assert_eq!(ws.groups(), vec!["TV".to_string(), "Sports".to_string()]);
    }

    #[tokio::test]
    async fn test_store_lifecycle() {
        let store = WorkspaceStore::new(Duration::from_secs(60));
        let id = store
            .create(workspace(&[("a", ""), ("b", "")]))
            .await;

        let len = store.read(id, |ws| ws.len()).await;
        assert_eq!(len, Some(2));

        assert_eq!(store.modify(id, |ws| ws.toggle(0, false)).await, Some(true));
        let count = store.read(id, |ws| ws.selected_count()).await;
        assert_eq!(count, Some(1));

        assert!(store.remove(id).await);
        assert!(store.read(id, |ws| ws.len()).await.is_none());
    }

    #[tokio::test]
    async fn test_store_sweep_drops_expired() {
        let store = WorkspaceStore::new(Duration::from_millis(0));
        store.create(workspace(&[("a", "")])).await;
        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.count().await, 0);
    }

    impl ChannelWorkspace {
        fn modify_tvg_name(&mut self, index: usize, tvg_name: &str) {
            self.channels[index].record.tvg_name = tvg_name.to_string();
        }
    }
}
