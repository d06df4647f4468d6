//! `indices:admin/resize`: shrink, split or clone an index

use async_trait::async_trait;
use chrono::Utc;
use shard_core::MAX_DOCS_PER_SHARD;
use std::sync::Arc;
use tracing::{debug, info};

use crate::date_math::resolve_date_math;
use crate::dispatcher::MasterAction;
use crate::error::MasterResult;
use crate::metadata::{BlockScope, ClusterBlockLevel, ClusterState};
use crate::resize::{prepare_request_with_limit, CreateIndexService, ResizeRequest, ResizeResponse};
use crate::stats::IndicesStatsProvider;

/// Resize action name
pub const RESIZE_ACTION_NAME: &str = "indices:admin/resize";

/// Name understood by nodes before 6.1.0, which only knew shrink
pub const LEGACY_SHRINK_NAME: &str = "indices:admin/shrink";

pub struct ResizeAction {
    stats: Arc<dyn IndicesStatsProvider>,
    create_index: Arc<dyn CreateIndexService>,
    max_docs_per_shard: u64,
}

impl ResizeAction {
    pub fn new(stats: Arc<dyn IndicesStatsProvider>, create_index: Arc<dyn CreateIndexService>) -> Self {
        Self {
            stats,
            create_index,
            max_docs_per_shard: MAX_DOCS_PER_SHARD,
        }
    }

    /// Lower the per-shard doc ceiling applied to shrinks
    pub fn with_max_docs_per_shard(mut self, max_docs_per_shard: u64) -> Self {
        self.max_docs_per_shard = max_docs_per_shard;
        self
    }
}

#[async_trait]
impl MasterAction for ResizeAction {
    type Request = ResizeRequest;
    type Response = ResizeResponse;

    const NAME: &'static str = RESIZE_ACTION_NAME;

    fn check_block(&self, request: &ResizeRequest, state: &ClusterState) -> MasterResult<()> {
        let target = resolve_date_math(&request.target.index, Utc::now())?;
        state
            .blocks()
            .check(ClusterBlockLevel::MetadataWrite, &BlockScope::Index(target))
    }

    async fn execute(
        &self,
        request: ResizeRequest,
        state: Arc<ClusterState>,
    ) -> MasterResult<ResizeResponse> {
        request.validate()?;

        let now = Utc::now();
        let source_name = resolve_date_math(&request.source_index, now)?;
        let target_name = resolve_date_math(&request.target.index, now)?;

        let doc_counts = self.stats.doc_counts(&source_name).await?;
        debug!(
            "Fetched doc stats of {} shards of [{}] for {}",
            doc_counts.len(),
            source_name,
            request.resize_type
        );

        let update = prepare_request_with_limit(
            &request,
            &state,
            |shard| doc_counts.get(&shard).copied(),
            &source_name,
            &target_name,
            self.max_docs_per_shard,
        )?;

        info!(
            "Resizing [{}] into [{}] ({})",
            source_name, target_name, request.resize_type
        );
        self.create_index.create_index(update).await
    }
}
