//! Shared fixtures for master integration tests

#![allow(dead_code)]

pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use master::action::add_index_block;
use master::compat::CompatibilityTable;
use master::metadata::{
    ClusterState, DiscoveryNode, DiscoveryNodes, IndexBlock, IndexMetadata, Settings, Version,
};
use master::state::{MemoryStateStore, StateVersionWatcher};
use master::transport::MasterTransport;
use master::{MasterActionDispatcher, StateMutationPipeline};

pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn node(id: &str, version: Version) -> DiscoveryNode {
    DiscoveryNode::new(id, format!("{}.local:9200", id), version)
}

/// One node that is also the elected master
pub fn single_master() -> DiscoveryNodes {
    DiscoveryNodes::single(node("n1", Version::CURRENT))
}

/// Local node `n2` following master `n1` running `master_version`
pub fn follower_of(master_version: Version) -> DiscoveryNodes {
    DiscoveryNodes::local(node("n2", Version::CURRENT))
        .with_node(node("n1", master_version))
        .with_master(Some("n1".to_string()))
}

pub fn initial_state(nodes: DiscoveryNodes) -> Arc<ClusterState> {
    ClusterState::initial("test-cluster", nodes)
}

/// `state` plus an index with `shards` shards
pub fn with_index(state: &Arc<ClusterState>, name: &str, shards: u32, settings: Settings) -> Arc<ClusterState> {
    let index = IndexMetadata::builder(name)
        .number_of_shards(shards)
        .settings(settings)
        .build()
        .unwrap();
    state
        .builder()
        .metadata(state.metadata().clone().with_index(index))
        .build()
}

/// `state` plus a write-blocked index, ready to be resized
pub fn with_resizable_index(state: &Arc<ClusterState>, name: &str, shards: u32) -> Arc<ClusterState> {
    let state = with_index(state, name, shards, Settings::new());
    add_index_block(&state, name, IndexBlock::Write).unwrap()
}

pub fn start_pipeline(state: Arc<ClusterState>) -> Arc<StateMutationPipeline> {
    StateMutationPipeline::start(
        Arc::new(MemoryStateStore::new(state)),
        StateVersionWatcher::new(),
        64,
    )
}

pub fn dispatcher(
    pipeline: &Arc<StateMutationPipeline>,
    transport: Option<Arc<dyn MasterTransport>>,
) -> MasterActionDispatcher {
    MasterActionDispatcher::new(pipeline.clone(), transport, CompatibilityTable::default())
}
