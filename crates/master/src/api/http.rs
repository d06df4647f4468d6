//! HTTP admin API
//!
//! Master actions are dispatched by name, so a node that is not master
//! forwards them the same way the internal endpoint receives them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shard_core::ResizeType;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::ApiResponse;
use crate::action::{
    AddIndexBlockAction, AddIndexBlockRequest, CloneSnapshotAction, CreateIndexAction,
    DeleteAutoscalingPolicyAction, DeleteAutoscalingPolicyRequest, GetAutoscalingPolicyAction,
    GetAutoscalingPolicyRequest, PutAutoscalingPolicyAction, ResizeAction,
};
use crate::autoscaling::PutAutoscalingPolicyRequest;
use crate::dispatcher::MasterAction;
use crate::error::MasterError;
use crate::metadata::{IndexBlock, Settings};
use crate::resize::{ActiveShardCount, CreateIndexRequest, ResizeRequest, DEFAULT_TIMEOUT_MS};
use crate::snapshot::{CloneSnapshotRequest, SnapshotInfo};
use crate::stats::DocsStats;
use crate::transport::{ForwardedAction, FORWARD_PATH};
use crate::Master;

/// HTTP API service
pub struct HttpApi {
    master: Arc<Master>,
}

impl HttpApi {
    pub fn new(master: Arc<Master>) -> Self {
        Self { master }
    }

    pub fn router(self) -> Router {
        Router::new()
            // Cluster
            .route("/api/v1/cluster", get(get_cluster))
            .route("/api/v1/cluster/state", get(get_cluster_state))
            // Indices
            .route("/api/v1/indices/:index", put(create_index))
            .route("/api/v1/indices/:index/blocks/:block", put(add_index_block))
            .route("/api/v1/indices/:index/shrink/:target", post(shrink_index))
            .route("/api/v1/indices/:index/split/:target", post(split_index))
            .route("/api/v1/indices/:index/clone/:target", post(clone_index))
            .route("/api/v1/indices/:index/stats/:shard", put(report_doc_stats))
            // Snapshots
            .route("/api/v1/snapshots/:repository", put(put_repository))
            .route("/api/v1/snapshots/:repository/:snapshot", put(register_snapshot))
            .route(
                "/api/v1/snapshots/:repository/:snapshot/clone/:target",
                post(clone_snapshot),
            )
            // Autoscaling
            .route(
                "/api/v1/autoscaling/policies/:name",
                put(put_policy).get(get_policy).delete(delete_policy),
            )
            // Forwarded master actions
            .route(FORWARD_PATH, post(forwarded_action))
            .with_state(self.master)
    }
}

/// HTTP status of a failed master action
pub fn status_code(error: &MasterError) -> StatusCode {
    match error {
        MasterError::NotMaster { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MasterError::ClusterBlocked { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
        MasterError::ClusterBlocked { .. } => StatusCode::FORBIDDEN,
        MasterError::IndexNotFound(_) | MasterError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
        MasterError::IndexAlreadyExists(_)
        | MasterError::IllegalArgument(_)
        | MasterError::RemapInfeasible(_) => StatusCode::BAD_REQUEST,
        MasterError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        MasterError::Transport(_) => StatusCode::BAD_GATEWAY,
        MasterError::IllegalState(_) | MasterError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: MasterError) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    (status_code(&error), Json(ApiResponse::err(error)))
}

/// Dispatch a master action by name and wrap its outcome
async fn dispatch<R: Serialize>(
    master: &Master,
    action: &str,
    request: R,
) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let payload = match serde_json::to_value(request) {
        Ok(payload) => payload,
        Err(e) => return failure(MasterError::illegal_argument(e.to_string())),
    };
    match master.dispatcher().handle_named(action, payload).await {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(e) => {
            warn!("[{}] failed: {}", action, e);
            failure(e)
        }
    }
}

// ==================== Request types ====================

#[derive(Debug, Default, Deserialize)]
struct IndexBody {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    aliases: BTreeSet<String>,
    #[serde(default)]
    wait_for_active_shards: ActiveShardCount,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    master_timeout_ms: Option<u64>,
}

impl IndexBody {
    fn into_request(self, index: String) -> CreateIndexRequest {
        CreateIndexRequest {
            index,
            settings: self.settings,
            aliases: self.aliases,
            wait_for_active_shards: self.wait_for_active_shards,
            ack_timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            master_node_timeout_ms: self.master_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ResizeBody {
    #[serde(flatten)]
    target: IndexBody,
    #[serde(default)]
    copy_settings: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct StateQuery {
    wait_for_version: Option<u64>,
    #[serde(default = "default_wait_ms")]
    timeout_ms: u64,
}

fn default_wait_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotBody {
    #[serde(default)]
    indices: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyBody {
    #[serde(default)]
    roles: Option<BTreeSet<String>>,
    #[serde(default)]
    deciders: Option<BTreeMap<String, Settings>>,
}

#[derive(Serialize)]
struct ClusterOverview {
    cluster_name: String,
    version: u64,
    state_uuid: String,
    local_node: String,
    master_node: Option<String>,
    node_count: usize,
    index_count: usize,
}

// ==================== Handlers ====================

// Cluster
async fn get_cluster(State(master): State<Arc<Master>>) -> impl IntoResponse {
    let state = master.state();
    Json(ApiResponse::ok(ClusterOverview {
        cluster_name: state.cluster_name().to_string(),
        version: state.version(),
        state_uuid: state.state_uuid().to_string(),
        local_node: state.nodes().local_node_id().clone(),
        master_node: state.nodes().master_node_id().cloned(),
        node_count: state.nodes().len(),
        index_count: state.metadata().index_count(),
    }))
}

async fn get_cluster_state(
    State(master): State<Arc<Master>>,
    Query(query): Query<StateQuery>,
) -> impl IntoResponse {
    let state = match query.wait_for_version {
        Some(version) => {
            let pipeline = master.pipeline();
            pipeline
                .watcher()
                .wait_for(
                    pipeline.store().as_ref(),
                    version,
                    Duration::from_millis(query.timeout_ms),
                )
                .await
        }
        None => master.state(),
    };
    Json(ApiResponse::ok(state))
}

// Indices
async fn create_index(
    State(master): State<Arc<Master>>,
    Path(index): Path<String>,
    body: Option<Json<IndexBody>>,
) -> impl IntoResponse {
    let Json(body) = body.unwrap_or_default();
    dispatch(&master, CreateIndexAction::NAME, body.into_request(index)).await
}

async fn add_index_block(
    State(master): State<Arc<Master>>,
    Path((index, block)): Path<(String, String)>,
) -> impl IntoResponse {
    let block: IndexBlock = match block.parse() {
        Ok(block) => block,
        Err(e) => return failure(e),
    };
    dispatch(&master, AddIndexBlockAction::NAME, AddIndexBlockRequest { index, block }).await
}

async fn resize_index(
    master: &Master,
    resize_type: ResizeType,
    source: String,
    target: String,
    body: Option<Json<ResizeBody>>,
) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let Json(body) = body.unwrap_or_default();
    info!("{} [{}] into [{}] requested via HTTP API", resize_type, source, target);
    let mut request = ResizeRequest::new(resize_type, source, body.target.into_request(target));
    request.copy_settings = body.copy_settings;
    dispatch(master, ResizeAction::NAME, request).await
}

async fn shrink_index(
    State(master): State<Arc<Master>>,
    Path((index, target)): Path<(String, String)>,
    body: Option<Json<ResizeBody>>,
) -> impl IntoResponse {
    resize_index(&master, ResizeType::Shrink, index, target, body).await
}

async fn split_index(
    State(master): State<Arc<Master>>,
    Path((index, target)): Path<(String, String)>,
    body: Option<Json<ResizeBody>>,
) -> impl IntoResponse {
    resize_index(&master, ResizeType::Split, index, target, body).await
}

async fn clone_index(
    State(master): State<Arc<Master>>,
    Path((index, target)): Path<(String, String)>,
    body: Option<Json<ResizeBody>>,
) -> impl IntoResponse {
    resize_index(&master, ResizeType::Clone, index, target, body).await
}

async fn report_doc_stats(
    State(master): State<Arc<Master>>,
    Path((index, shard)): Path<(String, u32)>,
    Json(stats): Json<DocsStats>,
) -> impl IntoResponse {
    master.stats().report(&index, shard, stats);
    Json(ApiResponse::ok(stats))
}

// Snapshots
async fn put_repository(
    State(master): State<Arc<Master>>,
    Path(repository): Path<String>,
) -> impl IntoResponse {
    match master.snapshots().put_repository(&repository).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(serde_json::json!({ "acknowledged": true })))),
        Err(e) => failure(e),
    }
}

async fn register_snapshot(
    State(master): State<Arc<Master>>,
    Path((repository, snapshot)): Path<(String, String)>,
    Json(body): Json<SnapshotBody>,
) -> impl IntoResponse {
    let info = SnapshotInfo::completed(snapshot, body.indices);
    match master.snapshots().register_snapshot(&repository, info).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(serde_json::json!({ "acknowledged": true })))),
        Err(e) => failure(e),
    }
}

async fn clone_snapshot(
    State(master): State<Arc<Master>>,
    Path((repository, source, target)): Path<(String, String, String)>,
    body: Option<Json<SnapshotBody>>,
) -> impl IntoResponse {
    let Json(body) = body.unwrap_or_default();
    let request = CloneSnapshotRequest {
        repository,
        source,
        target,
        indices: body.indices,
    };
    dispatch(&master, CloneSnapshotAction::NAME, request).await
}

// Autoscaling
async fn put_policy(
    State(master): State<Arc<Master>>,
    Path(name): Path<String>,
    Json(body): Json<PolicyBody>,
) -> impl IntoResponse {
    let request = PutAutoscalingPolicyRequest {
        name,
        roles: body.roles,
        deciders: body.deciders,
    };
    dispatch(&master, PutAutoscalingPolicyAction::NAME, request).await
}

async fn get_policy(
    State(master): State<Arc<Master>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    dispatch(&master, GetAutoscalingPolicyAction::NAME, GetAutoscalingPolicyRequest { name }).await
}

async fn delete_policy(
    State(master): State<Arc<Master>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    dispatch(
        &master,
        DeleteAutoscalingPolicyAction::NAME,
        DeleteAutoscalingPolicyRequest { name },
    )
    .await
}

// Internal
async fn forwarded_action(
    State(master): State<Arc<Master>>,
    Json(forwarded): Json<ForwardedAction>,
) -> impl IntoResponse {
    dispatch(&master, &forwarded.action, forwarded.request).await
}
