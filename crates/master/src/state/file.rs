//! File persistent state store
//!
//! Persists every committed cluster state to a JSON file

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{StateStore, StoreError};
use crate::metadata::{ClusterState, DiscoveryNodes};

/// File-backed store
///
/// The current state is served from memory; commits are written to a temp
/// file and atomically renamed over `cluster_state.json` before they become
/// visible.
pub struct FileStateStore {
    data_dir: PathBuf,
    state_path: PathBuf,
    state: RwLock<Arc<ClusterState>>,
    /// Serializes commits so file and memory never diverge
    commit_lock: Mutex<()>,
}

impl FileStateStore {
    /// Open the store in `data_dir`, loading the persisted state or creating
    /// a fresh one
    ///
    /// Membership is a local view, so `nodes` replaces the persisted
    /// membership as a new state version.
    pub async fn open<P: AsRef<Path>>(
        data_dir: P,
        cluster_name: &str,
        nodes: DiscoveryNodes,
    ) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let state_path = data_dir.join("cluster_state.json");

        let state = match Self::load(&state_path).await? {
            Some(persisted) => {
                if persisted.cluster_name() != cluster_name {
                    warn!(
                        "Persisted state belongs to cluster '{}', configured cluster is '{}'",
                        persisted.cluster_name(),
                        cluster_name
                    );
                }
                persisted.builder().nodes(nodes).build()
            }
            None => {
                info!("Cluster state file not found, creating cluster '{}'", cluster_name);
                ClusterState::initial(cluster_name, nodes)
            }
        };

        let store = Self {
            data_dir,
            state_path,
            state: RwLock::new(state.clone()),
            commit_lock: Mutex::new(()),
        };
        store.save(&state).await?;
        Ok(store)
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.state_path
    }

    async fn load(path: &Path) -> Result<Option<Arc<ClusterState>>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await?;
        let state: ClusterState = serde_json::from_str(&content)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        info!(
            "Loaded cluster state: version {}, {} indices",
            state.version(),
            state.metadata().index_count()
        );

        Ok(Some(Arc::new(state)))
    }

    async fn save(&self, state: &ClusterState) -> Result<(), StoreError> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir).await?;
            info!("Created data directory: {:?}", self.data_dir);
        }

        // Write to temp file first, then atomically rename
        let temp_path = self.state_path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.state_path).await?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn current(&self) -> Arc<ClusterState> {
        self.state.read().clone()
    }

    async fn compare_and_replace(
        &self,
        expected_version: u64,
        new_state: Arc<ClusterState>,
    ) -> Result<(), StoreError> {
        let _guard = self.commit_lock.lock().await;

        let actual = self.state.read().version();
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }

        self.save(&new_state).await?;
        *self.state.write() = new_state;
        Ok(())
    }
}
