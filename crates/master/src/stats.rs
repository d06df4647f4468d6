//! Per-shard document statistics
//!
//! Doc counts are reported by the data nodes and consumed by shrink
//! validation. They are never part of the cluster state.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::MasterResult;

/// Document stats of one primary shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsStats {
    pub count: u64,
    #[serde(default)]
    pub deleted: u64,
}

impl DocsStats {
    pub fn new(count: u64) -> Self {
        Self { count, deleted: 0 }
    }
}

/// Stats collaborator
#[async_trait]
pub trait IndicesStatsProvider: Send + Sync {
    /// Primary doc stats per shard ordinal; shards without stats are absent
    async fn doc_counts(&self, index: &str) -> MasterResult<HashMap<u32, DocsStats>>;
}

/// Stats provider fed by node reports
#[derive(Default)]
pub struct InMemoryDocStats {
    indices: RwLock<HashMap<String, HashMap<u32, DocsStats>>>,
}

impl InMemoryDocStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest stats of one shard
    pub fn report(&self, index: &str, shard: u32, stats: DocsStats) {
        self.indices
            .write()
            .entry(index.to_string())
            .or_default()
            .insert(shard, stats);
    }

    /// Drop every report of an index
    pub fn forget(&self, index: &str) {
        self.indices.write().remove(index);
    }
}

#[async_trait]
impl IndicesStatsProvider for InMemoryDocStats {
    async fn doc_counts(&self, index: &str) -> MasterResult<HashMap<u32, DocsStats>> {
        Ok(self.indices.read().get(index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_replace_previous_values() {
        let stats = InMemoryDocStats::new();
        stats.report("logs", 0, DocsStats::new(10));
        stats.report("logs", 0, DocsStats::new(12));
        stats.report("logs", 1, DocsStats::new(3));

        let counts = stats.doc_counts("logs").await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&0].count, 12);
        assert!(stats.doc_counts("missing").await.unwrap().is_empty());

        stats.forget("logs");
        assert!(stats.doc_counts("logs").await.unwrap().is_empty());
    }
}
