//! Cluster blocks
//!
//! A block forbids a category of operations, either cluster-wide or on one
//! index. Master actions evaluate a block predicate before doing anything.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::settings::keys;
use crate::error::{MasterError, MasterResult};

/// Operation category a block applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterBlockLevel {
    Read,
    Write,
    MetadataRead,
    MetadataWrite,
}

impl ClusterBlockLevel {
    pub fn all() -> BTreeSet<ClusterBlockLevel> {
        [
            ClusterBlockLevel::Read,
            ClusterBlockLevel::Write,
            ClusterBlockLevel::MetadataRead,
            ClusterBlockLevel::MetadataWrite,
        ]
        .into_iter()
        .collect()
    }
}

/// A single block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlock {
    pub id: u32,
    pub description: String,
    /// Whether the operation may succeed once the block clears on its own
    pub retryable: bool,
    pub levels: BTreeSet<ClusterBlockLevel>,
}

impl ClusterBlock {
    pub fn new(
        id: u32,
        description: impl Into<String>,
        retryable: bool,
        levels: impl IntoIterator<Item = ClusterBlockLevel>,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            retryable,
            levels: levels.into_iter().collect(),
        }
    }

    /// Global block while the cluster state is not yet recovered
    pub fn state_not_recovered() -> Self {
        Self::new(1, "state not recovered / initialized", true, ClusterBlockLevel::all())
    }

    /// Global block while no master is elected
    pub fn no_master() -> Self {
        Self::new(
            2,
            "no master",
            true,
            [ClusterBlockLevel::Write, ClusterBlockLevel::MetadataWrite],
        )
    }

    /// Index block set by `index.blocks.read_only`
    pub fn index_read_only() -> Self {
        Self::new(
            5,
            "index read-only (api)",
            false,
            [ClusterBlockLevel::Write, ClusterBlockLevel::MetadataWrite],
        )
    }

    /// Index block set by `index.blocks.write`
    pub fn index_write() -> Self {
        Self::new(8, "index write (api)", false, [ClusterBlockLevel::Write])
    }

    /// Index block set by `index.blocks.metadata`
    pub fn index_metadata() -> Self {
        Self::new(
            9,
            "index metadata (api)",
            false,
            [ClusterBlockLevel::MetadataRead, ClusterBlockLevel::MetadataWrite],
        )
    }

    pub fn applies_to(&self, level: ClusterBlockLevel) -> bool {
        self.levels.contains(&level)
    }
}

impl fmt::Display for ClusterBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.id, self.description)
    }
}

/// Index blocks that can be switched on through an index setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBlock {
    Write,
    ReadOnly,
    Metadata,
}

impl IndexBlock {
    pub const ALL: [IndexBlock; 3] = [IndexBlock::Write, IndexBlock::ReadOnly, IndexBlock::Metadata];

    /// Boolean setting mirroring the block
    pub fn setting(&self) -> &'static str {
        match self {
            IndexBlock::Write => keys::BLOCKS_WRITE,
            IndexBlock::ReadOnly => keys::BLOCKS_READ_ONLY,
            IndexBlock::Metadata => keys::BLOCKS_METADATA,
        }
    }

    pub fn block(&self) -> ClusterBlock {
        match self {
            IndexBlock::Write => ClusterBlock::index_write(),
            IndexBlock::ReadOnly => ClusterBlock::index_read_only(),
            IndexBlock::Metadata => ClusterBlock::index_metadata(),
        }
    }
}

impl std::str::FromStr for IndexBlock {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "write" => Ok(IndexBlock::Write),
            "read_only" => Ok(IndexBlock::ReadOnly),
            "metadata" => Ok(IndexBlock::Metadata),
            other => Err(MasterError::illegal_argument(format!(
                "unknown index block [{}]",
                other
            ))),
        }
    }
}

/// Where a block predicate is evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockScope {
    /// Cluster-wide blocks only
    Global,
    /// Cluster-wide blocks plus the blocks of one index
    Index(String),
}

/// All blocks of a cluster state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlocks {
    global: Vec<ClusterBlock>,
    indices: BTreeMap<String, Vec<ClusterBlock>>,
}

impl ClusterBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks in `scope` that apply to `level`
    pub fn blocks_for(&self, level: ClusterBlockLevel, scope: &BlockScope) -> Vec<&ClusterBlock> {
        let index_blocks = match scope {
            BlockScope::Global => None,
            BlockScope::Index(index) => self.indices.get(index),
        };
        self.global
            .iter()
            .chain(index_blocks.into_iter().flatten())
            .filter(|b| b.applies_to(level))
            .collect()
    }

    /// Block predicate
    pub fn is_blocked(&self, level: ClusterBlockLevel, scope: &BlockScope) -> bool {
        !self.blocks_for(level, scope).is_empty()
    }

    /// Fail with `ClusterBlocked` when `scope` is blocked at `level`
    pub fn check(&self, level: ClusterBlockLevel, scope: &BlockScope) -> MasterResult<()> {
        let blocks = self.blocks_for(level, scope);
        if blocks.is_empty() {
            return Ok(());
        }
        let description = blocks
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(MasterError::ClusterBlocked {
            description: format!("{};", description),
            retryable: blocks.iter().all(|b| b.retryable),
        })
    }

    pub fn has_index_block(&self, index: &str, block_id: u32) -> bool {
        self.indices
            .get(index)
            .map(|blocks| blocks.iter().any(|b| b.id == block_id))
            .unwrap_or(false)
    }

    pub fn has_global_block(&self, block_id: u32) -> bool {
        self.global.iter().any(|b| b.id == block_id)
    }

    pub fn with_global_block(mut self, block: ClusterBlock) -> Self {
        if !self.has_global_block(block.id) {
            self.global.push(block);
        }
        self
    }

    pub fn without_global_block(mut self, block_id: u32) -> Self {
        self.global.retain(|b| b.id != block_id);
        self
    }

    pub fn with_index_block(mut self, index: &str, block: ClusterBlock) -> Self {
        let blocks = self.indices.entry(index.to_string()).or_default();
        if !blocks.iter().any(|b| b.id == block.id) {
            blocks.push(block);
        }
        self
    }

    pub fn without_index_blocks(mut self, index: &str) -> Self {
        self.indices.remove(index);
        self
    }
}
