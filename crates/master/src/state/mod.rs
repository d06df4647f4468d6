//! Cluster state storage
//!
//! The [`StateStore`] is the sole source of truth for the current cluster
//! state. Only the mutation pipeline replaces it, through an atomic
//! compare-and-replace keyed on the expected current version.

mod file;
mod memory;
mod watch;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use watch::StateVersionWatcher;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::MasterError;
use crate::metadata::ClusterState;

/// State store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("version conflict: expected current version [{expected}], found [{actual}]")]
    VersionConflict { expected: u64, actual: u64 },
}

impl From<StoreError> for MasterError {
    fn from(e: StoreError) -> Self {
        MasterError::Store(e.to_string())
    }
}

/// Holder of the current cluster state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Latest committed state
    fn current(&self) -> Arc<ClusterState>;

    /// Replace the current state with `new_state` if the current version is
    /// still `expected_version`. The new state is durable once this returns.
    async fn compare_and_replace(
        &self,
        expected_version: u64,
        new_state: Arc<ClusterState>,
    ) -> Result<(), StoreError>;
}
