//! Create-index and resize request types

use serde::{Deserialize, Serialize};
use shard_core::ResizeType;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{MasterError, MasterResult};
use crate::metadata::{keys, IndexRef, Settings};

/// Default ack and master-node timeout (30s)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// How many shard copies must be active before a create is acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveShardCount {
    #[default]
    Default,
    All,
    Count(u32),
}

/// User-facing create-index request; also the target part of a resize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndexRequest {
    pub index: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub wait_for_active_shards: ActiveShardCount,
    #[serde(default = "default_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub master_node_timeout_ms: u64,
}

impl CreateIndexRequest {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            settings: Settings::new(),
            aliases: BTreeSet::new(),
            wait_for_active_shards: ActiveShardCount::Default,
            ack_timeout_ms: DEFAULT_TIMEOUT_MS,
            master_node_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn master_node_timeout(&self) -> Duration {
        Duration::from_millis(self.master_node_timeout_ms)
    }
}

/// Resize `source_index` into the index described by `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeRequest {
    pub source_index: String,
    pub target: CreateIndexRequest,
    pub resize_type: ResizeType,
    /// Copy the source settings onto the target; may only be unset or true
    #[serde(default)]
    pub copy_settings: Option<bool>,
}

impl ResizeRequest {
    pub fn new(
        resize_type: ResizeType,
        source_index: impl Into<String>,
        target: CreateIndexRequest,
    ) -> Self {
        Self {
            source_index: source_index.into(),
            target,
            resize_type,
            copy_settings: None,
        }
    }

    /// Request-level checks that need no cluster state
    pub fn validate(&self) -> MasterResult<()> {
        let mut errors = Vec::new();
        if self.source_index.is_empty() {
            errors.push("source index is missing".to_string());
        }
        if self.target.index.is_empty() {
            errors.push("index is missing".to_string());
        }
        if self.resize_type == ResizeType::Split
            && !self
                .target
                .settings
                .clone()
                .normalize_prefix(keys::INDEX_PREFIX)
                .contains(keys::NUMBER_OF_SHARDS)
        {
            errors.push(format!(
                "{} is required for split operations",
                keys::NUMBER_OF_SHARDS
            ));
        }
        if self.copy_settings == Some(false) {
            errors.push("[copySettings] can not be explicitly set to [false]".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MasterError::illegal_argument(format!(
                "Validation Failed: {}",
                errors
                    .iter()
                    .enumerate()
                    .map(|(i, e)| format!("{}: {};", i + 1, e))
                    .collect::<Vec<_>>()
                    .join("")
            )))
        }
    }
}

/// Fully resolved create-index request executed by the create-index service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexUpdateRequest {
    /// Why the index is created, e.g. `api` or `shrink_index`
    pub cause: String,
    pub index: String,
    pub settings: Settings,
    pub aliases: BTreeSet<String>,
    pub wait_for_active_shards: ActiveShardCount,
    /// Source index of a resize
    pub recover_from: Option<IndexRef>,
    pub resize_type: Option<ResizeType>,
    pub copy_settings: bool,
    pub ack_timeout: Duration,
    pub master_node_timeout: Duration,
}

impl CreateIndexUpdateRequest {
    /// Plain (non-resize) create from a user request
    pub fn from_request(cause: impl Into<String>, request: CreateIndexRequest) -> Self {
        let ack_timeout = request.ack_timeout();
        let master_node_timeout = request.master_node_timeout();
        Self {
            cause: cause.into(),
            index: request.index,
            settings: request.settings.normalize_prefix(keys::INDEX_PREFIX),
            aliases: request.aliases,
            wait_for_active_shards: request.wait_for_active_shards,
            recover_from: None,
            resize_type: None,
            copy_settings: false,
            ack_timeout,
            master_node_timeout,
        }
    }
}

/// Outcome of creating an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndexResponse {
    pub acknowledged: bool,
    pub shards_acknowledged: bool,
    pub index: String,
}

/// Outcome of a resize; the target index is reported as `index`
pub type ResizeResponse = CreateIndexResponse;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_requires_shard_count() {
        let request = ResizeRequest::new(ResizeType::Split, "logs", CreateIndexRequest::new("big"));
        let err = request.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation Failed: 1: index.number_of_shards is required for split operations;"
        );

        let target = CreateIndexRequest::new("big").settings(Settings::new().with("number_of_shards", 4));
        assert!(ResizeRequest::new(ResizeType::Split, "logs", target).validate().is_ok());
    }

    #[test]
    fn test_copy_settings_cannot_be_false() {
        let mut request = ResizeRequest::new(ResizeType::Shrink, "logs", CreateIndexRequest::new("small"));
        request.copy_settings = Some(false);
        assert!(request.validate().is_err());
        request.copy_settings = Some(true);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: CreateIndexRequest = serde_json::from_str(r#"{"index":"logs"}"#).unwrap();
        assert_eq!(request.ack_timeout(), Duration::from_secs(30));
        assert_eq!(request.wait_for_active_shards, ActiveShardCount::Default);
        assert!(request.settings.is_empty());
    }
}
