//! Index bootstrap actions: create an index and add an index block

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::AcknowledgedResponse;
use crate::date_math::resolve_date_math;
use crate::dispatcher::MasterAction;
use crate::error::{MasterError, MasterResult};
use crate::metadata::{BlockScope, ClusterBlockLevel, ClusterState, IndexBlock};
use crate::pipeline::StateMutationPipeline;
use crate::resize::{
    CreateIndexRequest, CreateIndexResponse, CreateIndexService, CreateIndexUpdateRequest,
};

/// `indices:admin/create`
pub struct CreateIndexAction {
    create_index: Arc<dyn CreateIndexService>,
}

impl CreateIndexAction {
    pub fn new(create_index: Arc<dyn CreateIndexService>) -> Self {
        Self { create_index }
    }
}

#[async_trait]
impl MasterAction for CreateIndexAction {
    type Request = CreateIndexRequest;
    type Response = CreateIndexResponse;

    const NAME: &'static str = "indices:admin/create";

    fn check_block(&self, request: &CreateIndexRequest, state: &ClusterState) -> MasterResult<()> {
        let index = resolve_date_math(&request.index, Utc::now())?;
        state
            .blocks()
            .check(ClusterBlockLevel::MetadataWrite, &BlockScope::Index(index))
    }

    async fn execute(
        &self,
        mut request: CreateIndexRequest,
        _state: Arc<ClusterState>,
    ) -> MasterResult<CreateIndexResponse> {
        request.index = resolve_date_math(&request.index, Utc::now())?;
        let update = CreateIndexUpdateRequest::from_request("api", request);
        self.create_index.create_index(update).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddIndexBlockRequest {
    pub index: String,
    pub block: IndexBlock,
}

/// Set `block` on `index`, together with the setting mirroring it
pub fn add_index_block(
    current: &Arc<ClusterState>,
    index: &str,
    block: IndexBlock,
) -> MasterResult<Arc<ClusterState>> {
    let metadata = current
        .metadata()
        .index(index)
        .ok_or_else(|| MasterError::IndexNotFound(index.to_string()))?;

    let cluster_block = block.block();
    let has_setting = metadata.settings().get_bool(block.setting())? == Some(true);
    if has_setting && current.blocks().has_index_block(index, cluster_block.id) {
        return Ok(current.clone());
    }

    info!("adding block {:?} to indices [{}]", block, index);
    let settings = metadata.settings().clone().with(block.setting(), true);
    let updated = metadata.to_builder().settings(settings).build()?;

    let next = current.builder();
    let blocks = next.base_blocks().with_index_block(index, cluster_block);
    let indices = next.base_metadata().with_index(updated);
    Ok(next.metadata(indices).blocks(blocks).build())
}

/// `indices:admin/block/add`
pub struct AddIndexBlockAction {
    pipeline: Arc<StateMutationPipeline>,
    ack_timeout: Duration,
}

impl AddIndexBlockAction {
    pub fn new(pipeline: Arc<StateMutationPipeline>, ack_timeout: Duration) -> Self {
        Self {
            pipeline,
            ack_timeout,
        }
    }
}

#[async_trait]
impl MasterAction for AddIndexBlockAction {
    type Request = AddIndexBlockRequest;
    type Response = AcknowledgedResponse;

    const NAME: &'static str = "indices:admin/block/add";

    fn check_block(&self, request: &AddIndexBlockRequest, state: &ClusterState) -> MasterResult<()> {
        state.blocks().check(
            ClusterBlockLevel::MetadataWrite,
            &BlockScope::Index(request.index.clone()),
        )
    }

    async fn execute(
        &self,
        request: AddIndexBlockRequest,
        _state: Arc<ClusterState>,
    ) -> MasterResult<AcknowledgedResponse> {
        let source = format!("add-index-block-[{:?}]-[{}]", request.block, request.index);
        let ack = self
            .pipeline
            .submit_with_timeout(
                source,
                move |current| add_index_block(current, &request.index, request.block),
                self.ack_timeout,
            )
            .await?;
        Ok(AcknowledgedResponse::acknowledged(ack.acknowledged))
    }
}
