//! `cluster:admin/snapshot/clone`

use async_trait::async_trait;
use std::sync::Arc;

use super::AcknowledgedResponse;
use crate::dispatcher::MasterAction;
use crate::error::MasterResult;
use crate::metadata::{BlockScope, ClusterBlockLevel, ClusterState};
use crate::snapshot::{CloneSnapshotRequest, SnapshotService};

pub struct CloneSnapshotAction {
    snapshots: Arc<dyn SnapshotService>,
}

impl CloneSnapshotAction {
    pub fn new(snapshots: Arc<dyn SnapshotService>) -> Self {
        Self { snapshots }
    }
}

#[async_trait]
impl MasterAction for CloneSnapshotAction {
    type Request = CloneSnapshotRequest;
    type Response = AcknowledgedResponse;

    const NAME: &'static str = "cluster:admin/snapshot/clone";

    fn check_block(&self, _request: &CloneSnapshotRequest, state: &ClusterState) -> MasterResult<()> {
        state
            .blocks()
            .check(ClusterBlockLevel::MetadataRead, &BlockScope::Global)
    }

    async fn execute(
        &self,
        request: CloneSnapshotRequest,
        _state: Arc<ClusterState>,
    ) -> MasterResult<AcknowledgedResponse> {
        self.snapshots.clone_snapshot(request).await?;
        Ok(AcknowledgedResponse::acknowledged(true))
    }
}
