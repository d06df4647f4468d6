//! Cluster state
//!
//! [`ClusterState`] is an immutable snapshot shared through `Arc`. A new state
//! is derived from the current one with [`ClusterState::builder`], which bumps
//! the version by one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::blocks::ClusterBlocks;
use super::custom::{CustomMetadata, MetadataCustom};
use super::index::IndexMetadata;
use super::nodes::DiscoveryNodes;

/// Cluster-wide metadata: indices plus custom slots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    indices: BTreeMap<String, Arc<IndexMetadata>>,
    customs: BTreeMap<String, CustomMetadata>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self, name: &str) -> Option<&Arc<IndexMetadata>> {
        self.indices.get(name)
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn indices(&self) -> impl Iterator<Item = &Arc<IndexMetadata>> {
        self.indices.values()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Add or replace an index
    pub fn with_index(mut self, index: IndexMetadata) -> Self {
        self.indices.insert(index.name().to_string(), Arc::new(index));
        self
    }

    pub fn without_index(mut self, name: &str) -> Self {
        self.indices.remove(name);
        self
    }

    /// Typed custom slot, `None` when absent
    pub fn custom<T: MetadataCustom>(&self) -> Option<&T> {
        self.customs.get(T::NAME).and_then(T::from_custom)
    }

    pub fn with_custom<T: MetadataCustom>(mut self, custom: T) -> Self {
        self.customs.insert(T::NAME.to_string(), custom.into_custom());
        self
    }

    pub fn without_custom(mut self, name: &str) -> Self {
        self.customs.remove(name);
        self
    }
}

/// Immutable cluster state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    cluster_name: String,
    version: u64,
    state_uuid: String,
    nodes: Arc<DiscoveryNodes>,
    metadata: Arc<Metadata>,
    blocks: Arc<ClusterBlocks>,
}

impl ClusterState {
    /// Version-0 state with empty metadata
    pub fn initial(cluster_name: impl Into<String>, nodes: DiscoveryNodes) -> Arc<Self> {
        Arc::new(Self {
            cluster_name: cluster_name.into(),
            version: 0,
            state_uuid: new_state_uuid(),
            nodes: Arc::new(nodes),
            metadata: Arc::new(Metadata::new()),
            blocks: Arc::new(ClusterBlocks::new()),
        })
    }

    /// Builder for the successor of this state
    pub fn builder(&self) -> ClusterStateBuilder {
        ClusterStateBuilder {
            cluster_name: self.cluster_name.clone(),
            version: self.version + 1,
            nodes: self.nodes.clone(),
            metadata: self.metadata.clone(),
            blocks: self.blocks.clone(),
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state_uuid(&self) -> &str {
        &self.state_uuid
    }

    pub fn nodes(&self) -> &DiscoveryNodes {
        &self.nodes
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn blocks(&self) -> &ClusterBlocks {
        &self.blocks
    }
}

/// Builds the next [`ClusterState`]; unchanged parts share their `Arc`
#[derive(Debug, Clone)]
pub struct ClusterStateBuilder {
    cluster_name: String,
    version: u64,
    nodes: Arc<DiscoveryNodes>,
    metadata: Arc<Metadata>,
    blocks: Arc<ClusterBlocks>,
}

impl ClusterStateBuilder {
    pub fn nodes(mut self, nodes: DiscoveryNodes) -> Self {
        self.nodes = Arc::new(nodes);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Arc::new(metadata);
        self
    }

    pub fn blocks(mut self, blocks: ClusterBlocks) -> Self {
        self.blocks = Arc::new(blocks);
        self
    }

    /// Override the version, defaults to the base version plus one
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Clone of the base metadata for editing
    pub fn base_metadata(&self) -> Metadata {
        (*self.metadata).clone()
    }

    /// Clone of the base blocks for editing
    pub fn base_blocks(&self) -> ClusterBlocks {
        (*self.blocks).clone()
    }

    pub fn build(self) -> Arc<ClusterState> {
        Arc::new(ClusterState {
            cluster_name: self.cluster_name,
            version: self.version,
            state_uuid: new_state_uuid(),
            nodes: self.nodes,
            metadata: self.metadata,
            blocks: self.blocks,
        })
    }
}

fn new_state_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
