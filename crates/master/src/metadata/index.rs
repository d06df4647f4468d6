//! Index metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shard_core::{
    calculate_num_routing_shards, ResizeType, ShardId, ShardLayout, MAX_NUMBER_OF_SHARDS,
};
use std::collections::BTreeSet;

use super::settings::{keys, Settings};
use crate::error::{MasterError, MasterResult};

/// Check a shard count against `[1, MAX_NUMBER_OF_SHARDS]`
pub fn validate_number_of_shards(num_shards: u32) -> MasterResult<()> {
    if num_shards == 0 {
        return Err(MasterError::illegal_argument(format!(
            "Failed to parse value [0] for setting [{}] must be >= 1",
            keys::NUMBER_OF_SHARDS
        )));
    }
    if num_shards > MAX_NUMBER_OF_SHARDS {
        return Err(MasterError::illegal_argument(format!(
            "Failed to parse value [{}] for setting [{}] must be <= {}",
            num_shards,
            keys::NUMBER_OF_SHARDS,
            MAX_NUMBER_OF_SHARDS
        )));
    }
    Ok(())
}

/// (name, uuid) pair identifying one incarnation of an index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRef {
    pub name: String,
    pub uuid: String,
}

/// Back-reference from a resized index to the index it was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSource {
    pub index: IndexRef,
    pub resize_type: ResizeType,
}

/// Immutable per-index descriptor
///
/// Never mutated in place: changes produce a new value through
/// [`IndexMetadata::to_builder`] inside a pipeline task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    name: String,
    uuid: String,
    number_of_shards: u32,
    routing_num_shards: u32,
    settings: Settings,
    soft_deletes: bool,
    aliases: BTreeSet<String>,
    creation_date: DateTime<Utc>,
    resize_source: Option<ResizeSource>,
}

impl IndexMetadata {
    pub fn builder(name: impl Into<String>) -> IndexMetadataBuilder {
        IndexMetadataBuilder::new(name)
    }

    /// Builder seeded with every field of this index
    pub fn to_builder(&self) -> IndexMetadataBuilder {
        IndexMetadataBuilder {
            name: self.name.clone(),
            uuid: Some(self.uuid.clone()),
            number_of_shards: self.number_of_shards,
            routing_num_shards: Some(self.routing_num_shards),
            settings: self.settings.clone(),
            soft_deletes: self.soft_deletes,
            aliases: self.aliases.clone(),
            creation_date: Some(self.creation_date),
            resize_source: self.resize_source.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn number_of_shards(&self) -> u32 {
        self.number_of_shards
    }

    pub fn routing_num_shards(&self) -> u32 {
        self.routing_num_shards
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub fn resize_source(&self) -> Option<&ResizeSource> {
        self.resize_source.as_ref()
    }

    pub fn index_ref(&self) -> IndexRef {
        IndexRef {
            name: self.name.clone(),
            uuid: self.uuid.clone(),
        }
    }

    /// Shard layout consumed by the remap functions
    pub fn layout(&self) -> ShardLayout {
        ShardLayout::new(self.name.clone(), self.number_of_shards, self.routing_num_shards)
    }

    pub fn shard(&self, id: u32) -> ShardId {
        ShardId::new(self.name.clone(), id)
    }
}

/// Builder for [`IndexMetadata`]
#[derive(Debug, Clone)]
pub struct IndexMetadataBuilder {
    name: String,
    uuid: Option<String>,
    number_of_shards: u32,
    routing_num_shards: Option<u32>,
    settings: Settings,
    soft_deletes: bool,
    aliases: BTreeSet<String>,
    creation_date: Option<DateTime<Utc>>,
    resize_source: Option<ResizeSource>,
}

impl IndexMetadataBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            number_of_shards: 1,
            routing_num_shards: None,
            settings: Settings::new(),
            soft_deletes: true,
            aliases: BTreeSet::new(),
            creation_date: None,
            resize_source: None,
        }
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn number_of_shards(mut self, shards: u32) -> Self {
        self.number_of_shards = shards;
        self
    }

    /// Defaults to [`calculate_num_routing_shards`] when unset
    pub fn routing_num_shards(mut self, routing_num_shards: u32) -> Self {
        self.routing_num_shards = Some(routing_num_shards);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn soft_deletes(mut self, enabled: bool) -> Self {
        self.soft_deletes = enabled;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn aliases(mut self, aliases: impl IntoIterator<Item = String>) -> Self {
        self.aliases.extend(aliases);
        self
    }

    pub fn creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    pub fn resize_source(mut self, source: ResizeSource) -> Self {
        self.resize_source = Some(source);
        self
    }

    pub fn build(self) -> MasterResult<IndexMetadata> {
        if self.name.is_empty() {
            return Err(MasterError::illegal_argument("index name must not be empty"));
        }
        validate_number_of_shards(self.number_of_shards)?;
        let routing_num_shards = self
            .routing_num_shards
            .unwrap_or_else(|| calculate_num_routing_shards(self.number_of_shards));
        if routing_num_shards < self.number_of_shards
            || routing_num_shards % self.number_of_shards != 0
        {
            return Err(MasterError::illegal_argument(format!(
                "the number of routing shards [{}] must be a multiple of the number of shards [{}]",
                routing_num_shards, self.number_of_shards
            )));
        }

        let mut settings = self.settings;
        settings.put(keys::NUMBER_OF_SHARDS, self.number_of_shards);
        settings.put(keys::SOFT_DELETES_ENABLED, self.soft_deletes);

        Ok(IndexMetadata {
            name: self.name,
            uuid: self
                .uuid
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
            number_of_shards: self.number_of_shards,
            routing_num_shards,
            settings,
            soft_deletes: self.soft_deletes,
            aliases: self.aliases,
            creation_date: self.creation_date.unwrap_or_else(Utc::now),
            resize_source: self.resize_source,
        })
    }
}
