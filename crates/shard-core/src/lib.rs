//! Core shard routing and resize remapping
//!
//! Provides the pure, I/O-free pieces of index resizing:
//! - Shard identifiers and per-index shard layout
//! - Document routing over a fixed routing-shard hash space
//! - Shrink / split / clone remapping between source and target shards

pub mod remap;
pub mod routing;
pub mod shard;

// Re-export commonly used types
pub use remap::{
    clone_map, remap, routing_factor, select_clone_shard, select_shrink_shards,
    select_split_shard, shrink_map, split_map, RemapError, ShardRemap,
};
pub use routing::{calculate_num_routing_shards, routing_hash, shard_for_hash, shard_for_key};
pub use shard::{ResizeType, ShardId, ShardLayout, MAX_DOCS_PER_SHARD, MAX_NUMBER_OF_SHARDS};
