//! Master actions
//!
//! Each action implements [`MasterAction`](crate::dispatcher::MasterAction)
//! and is registered with the dispatcher under its action name.

pub mod autoscaling;
pub mod index;
pub mod resize;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use autoscaling::{
    DeleteAutoscalingPolicyAction, DeleteAutoscalingPolicyRequest, GetAutoscalingPolicyAction,
    GetAutoscalingPolicyRequest, GetAutoscalingPolicyResponse, PutAutoscalingPolicyAction,
};
pub use index::{add_index_block, AddIndexBlockAction, AddIndexBlockRequest, CreateIndexAction};
pub use resize::{ResizeAction, LEGACY_SHRINK_NAME, RESIZE_ACTION_NAME};
pub use snapshot::CloneSnapshotAction;

/// Response of actions that only report acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgedResponse {
    pub acknowledged: bool,
}

impl AcknowledgedResponse {
    pub fn acknowledged(acknowledged: bool) -> Self {
        Self { acknowledged }
    }
}
