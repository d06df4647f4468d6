//! Cluster state version watch
//!
//! Lets callers wait until a state newer than a known version is committed

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::debug;

use super::StateStore;
use crate::metadata::ClusterState;

/// Callers waiting past one known version
struct VersionWatch {
    notify: Arc<Notify>,
    waiters: usize,
}

/// Version watch manager
///
/// Watches are keyed by the version the caller already knows. A commit of
/// version `v` fires and drops every watch keyed below `v`.
#[derive(Clone)]
pub struct StateVersionWatcher {
    watches: Arc<RwLock<BTreeMap<u64, VersionWatch>>>,
}

impl StateVersionWatcher {
    pub fn new() -> Self {
        Self {
            watches: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Register a watch that fires once a version above `known_version` commits
    ///
    /// Callers that give up before it fires hand it back with [`release`](Self::release).
    pub async fn watch(&self, known_version: u64) -> Arc<Notify> {
        let mut watches = self.watches.write().await;
        let watch = watches.entry(known_version).or_insert_with(|| VersionWatch {
            notify: Arc::new(Notify::new()),
            waiters: 0,
        });
        watch.waiters += 1;
        debug!(
            "Registered watch past cluster state version {} ({} waiting)",
            known_version, watch.waiters
        );
        watch.notify.clone()
    }

    /// Drop one registration of a watch that has not fired
    pub async fn release(&self, known_version: u64, notify: &Arc<Notify>) {
        let mut watches = self.watches.write().await;
        let Some(watch) = watches.get_mut(&known_version) else {
            return;
        };
        // Already fired and replaced by a newer registration
        if !Arc::ptr_eq(&watch.notify, notify) {
            return;
        }
        watch.waiters = watch.waiters.saturating_sub(1);
        if watch.waiters == 0 {
            watches.remove(&known_version);
        }
    }

    /// Wake every watch registered below `version`
    pub async fn notify_version(&self, version: u64) {
        let mut watches = self.watches.write().await;
        let pending = watches.split_off(&version);
        let fired = std::mem::replace(&mut *watches, pending);
        drop(watches);

        if fired.is_empty() {
            return;
        }
        let waiters: usize = fired.values().map(|w| w.waiters).sum();
        debug!(
            "Cluster state version {} committed, waking {} waiters on {} versions",
            version,
            waiters,
            fired.len()
        );
        for watch in fired.into_values() {
            watch.notify.notify_waiters();
        }
    }

    /// Number of versions with pending watches
    pub async fn pending(&self) -> usize {
        self.watches.read().await.len()
    }

    /// Wait until `store` holds a state newer than `known_version`, or until
    /// `timeout` elapses; returns the state current at that point
    pub async fn wait_for(
        &self,
        store: &dyn StateStore,
        known_version: u64,
        timeout: Duration,
    ) -> Arc<ClusterState> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notify = self.watch(known_version).await;
            let notified = notify.notified();
            tokio::pin!(notified);
            // Enable before re-checking so a commit in between is not missed
            notified.as_mut().enable();

            let current = store.current();
            if current.version() > known_version {
                self.release(known_version, &notify).await;
                return current;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                self.release(known_version, &notify).await;
                return store.current();
            }
        }
    }
}

impl Default for StateVersionWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DiscoveryNode, DiscoveryNodes, Version};
    use crate::state::MemoryStateStore;

    fn store() -> Arc<MemoryStateStore> {
        let node = DiscoveryNode::new("n1", "127.0.0.1:9200", Version::CURRENT);
        Arc::new(MemoryStateStore::new(ClusterState::initial(
            "test",
            DiscoveryNodes::single(node),
        )))
    }

    #[tokio::test]
    async fn test_wait_for_newer_version() {
        let store = store();
        let watcher = StateVersionWatcher::new();

        let waiter = {
            let store = store.clone();
            let watcher = watcher.clone();
            tokio::spawn(async move {
                watcher
                    .wait_for(store.as_ref(), 0, Duration::from_secs(5))
                    .await
                    .version()
            })
        };

        // Let the waiter register
        while watcher.pending().await == 0 {
            tokio::task::yield_now().await;
        }
        let next = store.current().builder().build();
        store.compare_and_replace(0, next).await.unwrap();
        watcher.notify_version(1).await;

        assert_eq!(waiter.await.unwrap(), 1);
        assert_eq!(watcher.pending().await, 0);
    }

    #[tokio::test]
    async fn test_wait_for_times_out_with_current_state() {
        let store = store();
        let watcher = StateVersionWatcher::new();
        let state = watcher
            .wait_for(store.as_ref(), 0, Duration::from_millis(20))
            .await;
        assert_eq!(state.version(), 0);
        assert_eq!(watcher.pending().await, 0);
    }

    #[tokio::test]
    async fn test_release_keeps_other_waiters() {
        let watcher = StateVersionWatcher::new();
        let first = watcher.watch(3).await;
        let second = watcher.watch(3).await;
        assert!(Arc::ptr_eq(&first, &second));

        watcher.release(3, &first).await;
        assert_eq!(watcher.pending().await, 1);
        watcher.release(3, &second).await;
        assert_eq!(watcher.pending().await, 0);
    }

    #[tokio::test]
    async fn test_commit_fires_only_lower_versions() {
        let watcher = StateVersionWatcher::new();
        let stale = watcher.watch(1).await;
        let _current = watcher.watch(4).await;

        watcher.notify_version(4).await;
        assert_eq!(watcher.pending().await, 1);

        // a registration for the same version after firing is a new watch
        let fresh = watcher.watch(1).await;
        assert!(!Arc::ptr_eq(&stale, &fresh));
        watcher.release(1, &stale).await;
        assert_eq!(watcher.pending().await, 2);
    }

    #[tokio::test]
    async fn test_wait_for_returns_immediately_when_already_newer() {
        let store = store();
        let next = store.current().builder().build();
        store.compare_and_replace(0, next).await.unwrap();

        let watcher = StateVersionWatcher::new();
        let state = watcher
            .wait_for(store.as_ref(), 0, Duration::from_secs(5))
            .await;
        assert_eq!(state.version(), 1);
        assert_eq!(watcher.pending().await, 0);
    }
}
