//! Cluster state definitions
//!
//! Contains the immutable cluster state and everything it owns: nodes,
//! index metadata, settings, blocks and custom metadata slots

mod blocks;
mod cluster;
mod custom;
mod index;
mod nodes;
mod settings;

pub use blocks::{BlockScope, ClusterBlock, ClusterBlockLevel, ClusterBlocks, IndexBlock};
pub use cluster::{ClusterState, ClusterStateBuilder, Metadata};
pub use custom::{CustomMetadata, MetadataCustom};
pub use index::{
    validate_number_of_shards, IndexMetadata, IndexMetadataBuilder, IndexRef, ResizeSource,
};
pub use nodes::{DiscoveryNode, DiscoveryNodes, NodeId, Version};
pub use settings::{keys, Settings};
