//! Document routing over the routing-shard hash space
//!
//! A key hashes into `[0, routing_num_shards)`, and the hash space is cut into
//! `number_of_shards` contiguous buckets. Because every legal resize target
//! divides (or is divided by) the same hash space, a shard's documents land in a
//! predictable set of target shards without rehashing stored data.

use crc::{Crc, CRC_32_ISCSI};

use crate::shard::ShardLayout;

/// CRC32C calculator used for routing keys
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Upper bound for automatically chosen routing shards (2^10)
const LOG2_MAX_ROUTING_SHARDS: u32 = 10;

/// Hash a routing key
pub fn routing_hash(key: &[u8]) -> u32 {
    CRC32.checksum(key)
}

/// Shard ordinal that owns `hash` in the given layout
pub fn shard_for_hash(hash: u32, layout: &ShardLayout) -> u32 {
    let routing_num_shards = layout.routing_num_shards.max(1);
    let number_of_shards = layout.number_of_shards.max(1);
    let routing_factor = (routing_num_shards / number_of_shards).max(1);
    (hash % routing_num_shards) / routing_factor
}

/// Shard ordinal that owns `key` in the given layout
pub fn shard_for_key(key: &[u8], layout: &ShardLayout) -> u32 {
    shard_for_hash(routing_hash(key), layout)
}

/// Default routing shards for a new index with `num_shards` shards.
///
/// Picks the largest `num_shards * 2^x` not above 1024, but always allows at
/// least one split.
pub fn calculate_num_routing_shards(num_shards: u32) -> u32 {
    let num_shards = num_shards.max(1);
    // ceil(log2(num_shards))
    let log2_num_shards = 32 - (num_shards - 1).leading_zeros();
    let num_splits = LOG2_MAX_ROUTING_SHARDS
        .saturating_sub(log2_num_shards)
        .max(1);
    num_shards << num_splits
}
