//! Autoscaling policy actions: put, get and delete

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::AcknowledgedResponse;
use crate::autoscaling::{
    delete_autoscaling_policy, get_autoscaling_policy, put_autoscaling_policy, AutoscalingPolicy,
    PutAutoscalingPolicyRequest,
};
use crate::dispatcher::MasterAction;
use crate::error::MasterResult;
use crate::metadata::{BlockScope, ClusterBlockLevel, ClusterState};
use crate::pipeline::StateMutationPipeline;

/// `cluster:admin/autoscaling/put_autoscaling_policy`
pub struct PutAutoscalingPolicyAction {
    pipeline: Arc<StateMutationPipeline>,
    ack_timeout: Duration,
}

impl PutAutoscalingPolicyAction {
    pub fn new(pipeline: Arc<StateMutationPipeline>, ack_timeout: Duration) -> Self {
        Self {
            pipeline,
            ack_timeout,
        }
    }
}

#[async_trait]
impl MasterAction for PutAutoscalingPolicyAction {
    type Request = PutAutoscalingPolicyRequest;
    type Response = AcknowledgedResponse;

    const NAME: &'static str = "cluster:admin/autoscaling/put_autoscaling_policy";

    fn check_block(&self, _request: &PutAutoscalingPolicyRequest, state: &ClusterState) -> MasterResult<()> {
        state
            .blocks()
            .check(ClusterBlockLevel::MetadataWrite, &BlockScope::Global)
    }

    async fn execute(
        &self,
        request: PutAutoscalingPolicyRequest,
        _state: Arc<ClusterState>,
    ) -> MasterResult<AcknowledgedResponse> {
        let source = format!("put-autoscaling-policy [{}]", request.name);
        let ack = self
            .pipeline
            .submit_with_timeout(
                source,
                move |current| put_autoscaling_policy(current, request),
                self.ack_timeout,
            )
            .await?;
        Ok(AcknowledgedResponse::acknowledged(ack.acknowledged))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAutoscalingPolicyRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAutoscalingPolicyResponse {
    pub policy: AutoscalingPolicy,
}

/// `cluster:admin/autoscaling/get_autoscaling_policy`
#[derive(Default)]
pub struct GetAutoscalingPolicyAction;

#[async_trait]
impl MasterAction for GetAutoscalingPolicyAction {
    type Request = GetAutoscalingPolicyRequest;
    type Response = GetAutoscalingPolicyResponse;

    const NAME: &'static str = "cluster:admin/autoscaling/get_autoscaling_policy";

    fn check_block(&self, _request: &GetAutoscalingPolicyRequest, state: &ClusterState) -> MasterResult<()> {
        state
            .blocks()
            .check(ClusterBlockLevel::MetadataRead, &BlockScope::Global)
    }

    async fn execute(
        &self,
        request: GetAutoscalingPolicyRequest,
        state: Arc<ClusterState>,
    ) -> MasterResult<GetAutoscalingPolicyResponse> {
        let policy = get_autoscaling_policy(&state, &request.name)?;
        Ok(GetAutoscalingPolicyResponse { policy })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAutoscalingPolicyRequest {
    /// Policy name, may contain `*` wildcards
    pub name: String,
}

/// `cluster:admin/autoscaling/delete_autoscaling_policy`
pub struct DeleteAutoscalingPolicyAction {
    pipeline: Arc<StateMutationPipeline>,
    ack_timeout: Duration,
}

impl DeleteAutoscalingPolicyAction {
    pub fn new(pipeline: Arc<StateMutationPipeline>, ack_timeout: Duration) -> Self {
        Self {
            pipeline,
            ack_timeout,
        }
    }
}

#[async_trait]
impl MasterAction for DeleteAutoscalingPolicyAction {
    type Request = DeleteAutoscalingPolicyRequest;
    type Response = AcknowledgedResponse;

    const NAME: &'static str = "cluster:admin/autoscaling/delete_autoscaling_policy";

    fn check_block(&self, _request: &DeleteAutoscalingPolicyRequest, state: &ClusterState) -> MasterResult<()> {
        state
            .blocks()
            .check(ClusterBlockLevel::MetadataWrite, &BlockScope::Global)
    }

    async fn execute(
        &self,
        request: DeleteAutoscalingPolicyRequest,
        _state: Arc<ClusterState>,
    ) -> MasterResult<AcknowledgedResponse> {
        let source = format!("delete-autoscaling-policy [{}]", request.name);
        let ack = self
            .pipeline
            .submit_with_timeout(
                source,
                move |current| delete_autoscaling_policy(current, &request.name),
                self.ack_timeout,
            )
            .await?;
        Ok(AcknowledgedResponse::acknowledged(ack.acknowledged))
    }
}
