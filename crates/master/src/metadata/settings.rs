//! Flat index settings
//!
//! Settings are stored as a sorted `key -> string` map. Typed accessors parse
//! on read and report malformed values as illegal arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MasterError, MasterResult};

/// Well-known setting keys
pub mod keys {
    pub const INDEX_PREFIX: &str = "index.";
    pub const NUMBER_OF_SHARDS: &str = "index.number_of_shards";
    pub const NUMBER_OF_ROUTING_SHARDS: &str = "index.number_of_routing_shards";
    pub const ROUTING_PARTITION_SIZE: &str = "index.routing_partition_size";
    pub const SOFT_DELETES_ENABLED: &str = "index.soft_deletes.enabled";
    pub const HISTORY_UUID: &str = "index.history.uuid";
    pub const BLOCKS_WRITE: &str = "index.blocks.write";
    pub const BLOCKS_READ_ONLY: &str = "index.blocks.read_only";
    pub const BLOCKS_METADATA: &str = "index.blocks.metadata";
    pub const RESIZE_SOURCE_NAME: &str = "index.resize.source.name";
    pub const RESIZE_SOURCE_UUID: &str = "index.resize.source.uuid";
}

/// Index settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style put
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.put(key, value);
        self
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Prefix every key that does not already carry `prefix`
    pub fn normalize_prefix(self, prefix: &str) -> Self {
        Settings(
            self.0
                .into_iter()
                .map(|(k, v)| {
                    if k.starts_with(prefix) {
                        (k, v)
                    } else {
                        (format!("{}{}", prefix, k), v)
                    }
                })
                .collect(),
        )
    }

    /// Overlay `other` on top of these settings
    pub fn merge(mut self, other: &Settings) -> Self {
        for (k, v) in other.iter() {
            self.0.insert(k.to_string(), v.to_string());
        }
        self
    }

    /// Keep only keys accepted by `keep`
    pub fn filter(self, keep: impl Fn(&str) -> bool) -> Self {
        Settings(self.0.into_iter().filter(|(k, _)| keep(k)).collect())
    }

    /// Parse an unsigned integer setting
    pub fn get_u32(&self, key: &str) -> MasterResult<Option<u32>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<u32>().map(Some).map_err(|_| {
                MasterError::illegal_argument(format!(
                    "Failed to parse value [{}] for setting [{}]",
                    raw, key
                ))
            }),
        }
    }

    /// Parse a boolean setting; only `true` and `false` are accepted
    pub fn get_bool(&self, key: &str) -> MasterResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            Some(raw) => Err(MasterError::illegal_argument(format!(
                "Failed to parse value [{}] as only [true] or [false] are allowed for setting [{}]",
                raw, key
            ))),
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Settings(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}
