//! Resize remapping
//!
//! Maps every target shard of a resized index back to the source shards that
//! feed it. The routing hash space is split into contiguous buckets, so with a
//! routing factor `f`:
//! - shrink: target `t` is fed by sources `[t * f, t * f + f)`
//! - split: target `t` is fed by source `t / f`
//! - clone: target `t` is fed by source `t`

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shard::{ResizeType, ShardId, ShardLayout};

/// Remap errors: the shard counts are incompatible with the resize type
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemapError {
    #[error("the number of target shards must be at least 1")]
    NoTargetShards,
    #[error("the number of target shards ({num_target}) must be greater than the shard id: {shard}")]
    ShardOutOfRange { shard: u32, num_target: u32 },
    #[error("the number of target shards [{num_target}] must be less that the number of source shards [{num_source}]")]
    TargetNotSmaller { num_source: u32, num_target: u32 },
    #[error("the number of source shards [{num_source}] must be less that the number of target shards [{num_target}]")]
    TargetNotLarger { num_source: u32, num_target: u32 },
    #[error("the number of source shards [{num_source}] must be a multiple of [{num_target}]")]
    NotAMultiple { num_source: u32, num_target: u32 },
    #[error("the number of source shards [{num_source}] must be a factor of [{num_target}]")]
    NotAFactor { num_source: u32, num_target: u32 },
    #[error("the number of routing shards [{routing_num_shards}] must be a multiple of the target shards [{num_target}]")]
    RoutingShardsNotMultiple { routing_num_shards: u32, num_target: u32 },
    #[error("the number of target shards ({num_target}) must be the same as the number of source shards ({num_source})")]
    CountMismatch { num_source: u32, num_target: u32 },
}

/// Number of source shards per target shard (shrink) or target shards per
/// source shard (split). Equal counts give a factor of 1.
pub fn routing_factor(source: u32, target: u32) -> Result<u32, RemapError> {
    if target == 0 {
        return Err(RemapError::NoTargetShards);
    }
    if source < target {
        let factor = target / source.max(1);
        if source == 0 || factor * source != target || factor <= 1 {
            return Err(RemapError::NotAFactor { num_source: source, num_target: target });
        }
        Ok(factor)
    } else if source > target {
        let factor = source / target;
        if factor * target != source || factor <= 1 {
            return Err(RemapError::NotAMultiple { num_source: source, num_target: target });
        }
        Ok(factor)
    } else {
        Ok(1)
    }
}

fn check_target_count(num_target: u32) -> Result<(), RemapError> {
    if num_target == 0 {
        return Err(RemapError::NoTargetShards);
    }
    Ok(())
}

fn check_ordinal(shard: u32, num_target: u32) -> Result<(), RemapError> {
    check_target_count(num_target)?;
    if shard >= num_target {
        return Err(RemapError::ShardOutOfRange { shard, num_target });
    }
    Ok(())
}

/// Source shards merged into target shard `shard` when shrinking to `num_target` shards
pub fn select_shrink_shards(
    shard: u32,
    source: &ShardLayout,
    num_target: u32,
) -> Result<BTreeSet<ShardId>, RemapError> {
    check_ordinal(shard, num_target)?;
    if source.number_of_shards < num_target {
        return Err(RemapError::TargetNotSmaller {
            num_source: source.number_of_shards,
            num_target,
        });
    }
    let factor = routing_factor(source.number_of_shards, num_target)?;
    let start = shard * factor;
    Ok((start..start + factor).map(|id| source.shard(id)).collect())
}

/// Source shard copied into target shard `shard` when splitting to `num_target` shards
pub fn select_split_shard(
    shard: u32,
    source: &ShardLayout,
    num_target: u32,
) -> Result<ShardId, RemapError> {
    check_ordinal(shard, num_target)?;
    let num_source = source.number_of_shards;
    if num_source > num_target {
        return Err(RemapError::TargetNotLarger {
            num_source,
            num_target,
        });
    }
    let factor = routing_factor(num_source, num_target)?;
    // A single-shard source can be split into any number of shards; its
    // effective routing space is the target count.
    let routing_num_shards = if num_source == 1 {
        num_target
    } else {
        source.routing_num_shards
    };
    if routing_num_shards % num_target != 0 {
        return Err(RemapError::RoutingShardsNotMultiple {
            routing_num_shards,
            num_target,
        });
    }
    Ok(source.shard(shard / factor))
}

/// Source shard copied into target shard `shard` when cloning
pub fn select_clone_shard(
    shard: u32,
    source: &ShardLayout,
    num_target: u32,
) -> Result<ShardId, RemapError> {
    check_ordinal(shard, num_target)?;
    if source.number_of_shards != num_target {
        return Err(RemapError::CountMismatch {
            num_source: source.number_of_shards,
            num_target,
        });
    }
    Ok(source.shard(shard))
}

/// Mapping from each target shard to the source shards feeding it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardRemap {
    targets: BTreeMap<ShardId, BTreeSet<ShardId>>,
}

impl ShardRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` feeds `target`
    pub fn insert(&mut self, target: ShardId, source: ShardId) {
        self.targets.entry(target).or_default().insert(source);
    }

    /// Source shards feeding a target shard
    pub fn sources_for(&self, target: &ShardId) -> Option<&BTreeSet<ShardId>> {
        self.targets.get(target)
    }

    /// Iterate (target, sources) in target order
    pub fn iter(&self) -> impl Iterator<Item = (&ShardId, &BTreeSet<ShardId>)> {
        self.targets.iter()
    }

    /// Number of target shards
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// How many target shards each source shard feeds
    pub fn source_fan_out(&self) -> BTreeMap<ShardId, usize> {
        let mut fan_out = BTreeMap::new();
        for sources in self.targets.values() {
            for source in sources {
                *fan_out.entry(source.clone()).or_insert(0) += 1;
            }
        }
        fan_out
    }

    /// True when every source shard of `layout` feeds at least one target
    /// and nothing outside the layout appears
    pub fn covers(&self, layout: &ShardLayout) -> bool {
        let fan_out = self.source_fan_out();
        fan_out.len() == layout.number_of_shards as usize
            && layout.shards().all(|s| fan_out.contains_key(&s))
    }

    /// True when every source shard of `layout` feeds exactly one target
    pub fn is_partition_of(&self, layout: &ShardLayout) -> bool {
        self.covers(layout) && self.source_fan_out().values().all(|&n| n == 1)
    }

    /// Reverse the direction: source shard -> target shards it feeds
    pub fn invert(&self) -> ShardRemap {
        let mut inverted = ShardRemap::new();
        for (target, sources) in &self.targets {
            for source in sources {
                inverted.insert(source.clone(), target.clone());
            }
        }
        inverted
    }
}

/// Full shrink map for `num_target` shards of `target_index`
pub fn shrink_map(
    source: &ShardLayout,
    target_index: &str,
    num_target: u32,
) -> Result<ShardRemap, RemapError> {
    check_target_count(num_target)?;
    let mut remap = ShardRemap::new();
    for shard in 0..num_target {
        for source_shard in select_shrink_shards(shard, source, num_target)? {
            remap.insert(ShardId::new(target_index, shard), source_shard);
        }
    }
    Ok(remap)
}

/// Full split map for `num_target` shards of `target_index`
pub fn split_map(
    source: &ShardLayout,
    target_index: &str,
    num_target: u32,
) -> Result<ShardRemap, RemapError> {
    check_target_count(num_target)?;
    let mut remap = ShardRemap::new();
    for shard in 0..num_target {
        let source_shard = select_split_shard(shard, source, num_target)?;
        remap.insert(ShardId::new(target_index, shard), source_shard);
    }
    Ok(remap)
}

/// Full clone map for `num_target` shards of `target_index`
pub fn clone_map(
    source: &ShardLayout,
    target_index: &str,
    num_target: u32,
) -> Result<ShardRemap, RemapError> {
    check_target_count(num_target)?;
    let mut remap = ShardRemap::new();
    for shard in 0..num_target {
        let source_shard = select_clone_shard(shard, source, num_target)?;
        remap.insert(ShardId::new(target_index, shard), source_shard);
    }
    Ok(remap)
}

/// Full remap for the given resize type
pub fn remap(
    resize_type: ResizeType,
    source: &ShardLayout,
    target_index: &str,
    num_target: u32,
) -> Result<ShardRemap, RemapError> {
    match resize_type {
        ResizeType::Shrink => shrink_map(source, target_index, num_target),
        ResizeType::Split => split_map(source, target_index, num_target),
        ResizeType::Clone => clone_map(source, target_index, num_target),
    }
}
