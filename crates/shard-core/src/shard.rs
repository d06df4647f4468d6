//! Shard identity and layout
//!
//! Defines shard identifiers, the shard layout of an index and the resize types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of documents a single shard can hold.
///
/// Matches the storage engine's hard limit (`i32::MAX - 128`).
pub const MAX_DOCS_PER_SHARD: u64 = 2_147_483_519;

/// Upper bound on the number of shards of one index
pub const MAX_NUMBER_OF_SHARDS: u32 = 1024;

/// Shard identifier: (index name, shard ordinal)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShardId {
    /// Index name
    pub index: String,
    /// Shard ordinal in `[0, number_of_shards)`
    pub id: u32,
}

impl ShardId {
    pub fn new(index: impl Into<String>, id: u32) -> Self {
        Self {
            index: index.into(),
            id,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.id)
    }
}

/// Shard layout of an index, the input of every remap operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardLayout {
    /// Index name
    pub index: String,
    /// Number of primary shards
    pub number_of_shards: u32,
    /// Routing hash-space granularity, fixed at index creation.
    /// Always a multiple of `number_of_shards`.
    pub routing_num_shards: u32,
}

impl ShardLayout {
    pub fn new(index: impl Into<String>, number_of_shards: u32, routing_num_shards: u32) -> Self {
        Self {
            index: index.into(),
            number_of_shards,
            routing_num_shards,
        }
    }

    /// Shard id for an ordinal of this index
    pub fn shard(&self, id: u32) -> ShardId {
        ShardId::new(self.index.clone(), id)
    }

    /// All shard ids of this index in ordinal order
    pub fn shards(&self) -> impl Iterator<Item = ShardId> + '_ {
        (0..self.number_of_shards).map(move |id| self.shard(id))
    }
}

/// Resize operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeType {
    /// Many source shards into fewer target shards
    Shrink,
    /// Few source shards into more target shards
    Split,
    /// Same number of shards
    Clone,
}

impl ResizeType {
    /// Lowercase name used in causes and action paths
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeType::Shrink => "shrink",
            ResizeType::Split => "split",
            ResizeType::Clone => "clone",
        }
    }

    /// Cause recorded on the create-index task, e.g. `shrink_index`
    pub fn cause(&self) -> String {
        format!("{}_index", self.as_str())
    }
}

impl fmt::Display for ResizeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResizeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shrink" => Ok(ResizeType::Shrink),
            "split" => Ok(ResizeType::Split),
            "clone" => Ok(ResizeType::Clone),
            other => Err(format!("unknown resize type [{}]", other)),
        }
    }
}
