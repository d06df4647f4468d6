//! Master action dispatch
//!
//! Every master action goes through [`MasterActionDispatcher::handle`]:
//! 1. if the local node is not the elected master, forward to the master
//!    (under the name its version understands) or fail with `NotMaster`
//! 2. evaluate the action's block predicate against the current state
//! 3. run the action, which submits to the pipeline or to an async service

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::compat::CompatibilityTable;
use crate::error::{MasterError, MasterResult};
use crate::metadata::ClusterState;
use crate::pipeline::StateMutationPipeline;
use crate::transport::MasterTransport;

/// An action that must run on the elected master
#[async_trait]
pub trait MasterAction: Send + Sync + 'static {
    type Request: Serialize + DeserializeOwned + Send + Sync + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;

    /// Action name, e.g. `indices:admin/resize`
    const NAME: &'static str;

    /// Fail with `ClusterBlocked` when a block forbids this request
    fn check_block(&self, request: &Self::Request, state: &ClusterState) -> MasterResult<()>;

    /// Run the action on the master
    async fn execute(
        &self,
        request: Self::Request,
        state: Arc<ClusterState>,
    ) -> MasterResult<Self::Response>;
}

/// Registry entry dispatching JSON payloads to a typed action
#[async_trait]
trait NamedHandler: Send + Sync {
    async fn handle_json(
        &self,
        dispatcher: &MasterActionDispatcher,
        payload: serde_json::Value,
    ) -> MasterResult<serde_json::Value>;
}

struct Registered<A: MasterAction>(Arc<A>);

#[async_trait]
impl<A: MasterAction> NamedHandler for Registered<A> {
    async fn handle_json(
        &self,
        dispatcher: &MasterActionDispatcher,
        payload: serde_json::Value,
    ) -> MasterResult<serde_json::Value> {
        let request: A::Request = serde_json::from_value(payload).map_err(|e| {
            MasterError::illegal_argument(format!("malformed request for [{}]: {}", A::NAME, e))
        })?;
        let response = dispatcher.handle(self.0.as_ref(), request).await?;
        to_json(&response)
    }
}

fn to_json<T: Serialize>(value: &T) -> MasterResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| MasterError::illegal_state(e.to_string()))
}

/// Routes master actions
pub struct MasterActionDispatcher {
    pipeline: Arc<StateMutationPipeline>,
    transport: Option<Arc<dyn MasterTransport>>,
    compat: CompatibilityTable,
    registry: HashMap<&'static str, Arc<dyn NamedHandler>>,
}

impl MasterActionDispatcher {
    pub fn new(
        pipeline: Arc<StateMutationPipeline>,
        transport: Option<Arc<dyn MasterTransport>>,
        compat: CompatibilityTable,
    ) -> Self {
        Self {
            pipeline,
            transport,
            compat,
            registry: HashMap::new(),
        }
    }

    /// Make `action` reachable through [`handle_named`](Self::handle_named)
    pub fn register<A: MasterAction>(&mut self, action: Arc<A>) {
        self.registry.insert(A::NAME, Arc::new(Registered(action)));
    }

    pub fn pipeline(&self) -> &Arc<StateMutationPipeline> {
        &self.pipeline
    }

    pub fn compat(&self) -> &CompatibilityTable {
        &self.compat
    }

    /// Registered action names
    pub fn actions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registry.keys().copied()
    }

    /// Dispatch a typed request
    pub async fn handle<A: MasterAction>(
        &self,
        action: &A,
        request: A::Request,
    ) -> MasterResult<A::Response> {
        let state = self.pipeline.state();
        let nodes = state.nodes();

        if self.pipeline.is_stepped_down() || !nodes.is_local_node_elected_master() {
            let master = nodes
                .master_node()
                .filter(|master| master.id != *nodes.local_node_id());
            return match (master, &self.transport) {
                (Some(master), Some(transport)) => {
                    let action_name = self.compat.action_name_for(A::NAME, &master.version);
                    debug!(
                        "Local node [{}] is not master, forwarding [{}] to [{}]",
                        nodes.local_node_id(),
                        action_name,
                        master.id
                    );
                    let response = transport
                        .send_to_node(master, action_name, to_json(&request)?)
                        .await?;
                    serde_json::from_value(response)
                        .map_err(|e| MasterError::Transport(e.to_string()))
                }
                _ => Err(MasterError::NotMaster {
                    local_node: nodes.local_node_id().clone(),
                    master_node: nodes.master_node_id().cloned(),
                }),
            };
        }

        action.check_block(&request, &state)?;

        debug!("Executing [{}] on master at state version {}", A::NAME, state.version());
        action.execute(request, state).await
    }

    /// Dispatch a JSON request by action name; legacy names are accepted
    pub async fn handle_named(
        &self,
        name: &str,
        payload: serde_json::Value,
    ) -> MasterResult<serde_json::Value> {
        let canonical = self.compat.canonical_name(name);
        let handler = self.registry.get(canonical).cloned().ok_or_else(|| {
            MasterError::illegal_argument(format!("no handler found for action [{}]", name))
        })?;
        handler.handle_json(self, payload).await
    }
}
