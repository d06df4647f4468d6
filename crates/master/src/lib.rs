//! Master - cluster-state coordination for a sharded document store
//!
//! Owns the authoritative cluster state and is the only writer of it.
//!
//! # Features
//! - Single-writer state mutation pipeline over an immutable, versioned state
//! - Master action dispatch with block checks and forwarding to the elected master
//! - Index resize (shrink, split, clone) with shard remapping and doc ceilings
//! - Snapshot clone and autoscaling policy bookkeeping
//!
//! # Usage Example
//! ```ignore
//! use master::{Master, MasterConfig, api::HttpApi};
//!
//! let master = Arc::new(Master::new(MasterConfig::default()).await?);
//! let app = HttpApi::new(master).router();
//! ```

pub mod action;
pub mod api;
pub mod autoscaling;
pub mod compat;
pub mod config;
pub mod date_math;
pub mod dispatcher;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod resize;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod transport;
pub mod wildcard;

// Re-export commonly used types
pub use config::{ConfigError, MasterArgs, MasterConfig};
pub use dispatcher::{MasterAction, MasterActionDispatcher};
pub use error::{MasterError, MasterResult};
pub use metadata::ClusterState;
pub use pipeline::StateMutationPipeline;

use std::sync::Arc;
use tracing::info;

use action::{
    AddIndexBlockAction, CloneSnapshotAction, CreateIndexAction, DeleteAutoscalingPolicyAction,
    GetAutoscalingPolicyAction, PutAutoscalingPolicyAction, ResizeAction,
};
use compat::CompatibilityTable;
use resize::MetadataCreateIndexService;
use snapshot::ClusterSnapshotService;
use state::{FileStateStore, StateStore, StateVersionWatcher};
use stats::InMemoryDocStats;
use transport::HttpMasterTransport;

/// Master node
pub struct Master {
    config: MasterConfig,
    pipeline: Arc<StateMutationPipeline>,
    dispatcher: MasterActionDispatcher,
    stats: Arc<InMemoryDocStats>,
    snapshots: Arc<ClusterSnapshotService>,
}

impl Master {
    /// Open the persisted state in the configured data directory and start
    /// the mutation pipeline
    pub async fn new(config: MasterConfig) -> MasterResult<Self> {
        let store = FileStateStore::open(
            &config.data_dir,
            &config.cluster_name,
            config.discovery_nodes(),
        )
        .await?;
        info!("Loaded cluster state from {}", store.path().display());
        Self::with_store(config, Arc::new(store))
    }

    /// Start a master over an already opened store
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_store(config: MasterConfig, store: Arc<dyn StateStore>) -> MasterResult<Self> {
        let pipeline = StateMutationPipeline::start(
            store,
            StateVersionWatcher::new(),
            config.queue_capacity,
        );
        let transport = HttpMasterTransport::new(config.forward_timeout())?;
        let mut dispatcher = MasterActionDispatcher::new(
            pipeline.clone(),
            Some(Arc::new(transport)),
            CompatibilityTable::default(),
        );

        let stats = Arc::new(InMemoryDocStats::new());
        let snapshots = Arc::new(ClusterSnapshotService::new(pipeline.clone()));
        let create_index = Arc::new(MetadataCreateIndexService::new(pipeline.clone()));
        let ack_timeout = config.ack_timeout();

        dispatcher.register(Arc::new(
            ResizeAction::new(stats.clone(), create_index.clone())
                .with_max_docs_per_shard(config.max_docs_per_shard),
        ));
        dispatcher.register(Arc::new(CreateIndexAction::new(create_index)));
        dispatcher.register(Arc::new(AddIndexBlockAction::new(pipeline.clone(), ack_timeout)));
        dispatcher.register(Arc::new(CloneSnapshotAction::new(snapshots.clone())));
        dispatcher.register(Arc::new(PutAutoscalingPolicyAction::new(
            pipeline.clone(),
            ack_timeout,
        )));
        dispatcher.register(Arc::new(GetAutoscalingPolicyAction));
        dispatcher.register(Arc::new(DeleteAutoscalingPolicyAction::new(
            pipeline.clone(),
            ack_timeout,
        )));

        let state = pipeline.state();
        info!(
            "Master started for cluster '{}' at state version {} (local node [{}], master [{}])",
            state.cluster_name(),
            state.version(),
            state.nodes().local_node_id(),
            state.nodes().master_node_id().map(String::as_str).unwrap_or("none")
        );

        Ok(Self {
            config,
            pipeline,
            dispatcher,
            stats,
            snapshots,
        })
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Latest committed cluster state
    pub fn state(&self) -> Arc<ClusterState> {
        self.pipeline.state()
    }

    pub fn pipeline(&self) -> &Arc<StateMutationPipeline> {
        &self.pipeline
    }

    pub fn dispatcher(&self) -> &MasterActionDispatcher {
        &self.dispatcher
    }

    /// Per-shard doc stats reported by data nodes
    pub fn stats(&self) -> &Arc<InMemoryDocStats> {
        &self.stats
    }

    pub fn snapshots(&self) -> &Arc<ClusterSnapshotService> {
        &self.snapshots
    }
}
