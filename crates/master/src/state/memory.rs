//! In-memory state store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use super::{StateStore, StoreError};
use crate::metadata::ClusterState;

/// Non-durable store, used for tests and embedded masters
pub struct MemoryStateStore {
    state: RwLock<Arc<ClusterState>>,
}

impl MemoryStateStore {
    pub fn new(initial: Arc<ClusterState>) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn current(&self) -> Arc<ClusterState> {
        self.state.read().clone()
    }

    async fn compare_and_replace(
        &self,
        expected_version: u64,
        new_state: Arc<ClusterState>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.version() != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: state.version(),
            });
        }
        *state = new_state;
        Ok(())
    }
}
