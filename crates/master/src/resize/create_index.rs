//! Index creation on the master
//!
//! Covers plain creates and the create step of a resize. The state
//! transition re-validates everything against the state it runs on, since
//! the state may have moved since the request was prepared.

use async_trait::async_trait;
use shard_core::{calculate_num_routing_shards, remap};
use std::sync::Arc;
use tracing::info;

use super::request::{CreateIndexResponse, CreateIndexUpdateRequest};
use crate::error::{MasterError, MasterResult};
use crate::metadata::{
    keys, BlockScope, ClusterBlockLevel, ClusterState, IndexBlock, IndexMetadata, IndexRef,
    ResizeSource, Settings,
};
use crate::pipeline::StateMutationPipeline;

/// Create-index collaborator
#[async_trait]
pub trait CreateIndexService: Send + Sync {
    async fn create_index(&self, request: CreateIndexUpdateRequest) -> MasterResult<CreateIndexResponse>;
}

/// Settings never carried over from a resize source
const NOT_COPYABLE_ON_RESIZE: &[&str] = &[
    keys::NUMBER_OF_SHARDS,
    keys::NUMBER_OF_ROUTING_SHARDS,
    keys::HISTORY_UUID,
    keys::RESIZE_SOURCE_NAME,
    keys::RESIZE_SOURCE_UUID,
];

/// Maximum index name length in bytes
const MAX_INDEX_NAME_BYTES: usize = 255;

/// Check an index (or alias) name
pub fn validate_index_name(name: &str) -> MasterResult<()> {
    let invalid = |reason: &str| {
        MasterError::illegal_argument(format!("Invalid index name [{}], {}", name, reason))
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.contains(['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':']) {
        return Err(invalid(
            "must not contain the following characters [ , \", *, \\, <, |, ,, >, /, ?, #, :]",
        ));
    }
    if name.starts_with(['_', '-', '+']) {
        return Err(invalid("must not start with '_', '-', or '+'"));
    }
    if name == "." || name == ".." {
        return Err(invalid("must not be '.' or '..'"));
    }
    if name.chars().any(char::is_uppercase) {
        return Err(invalid("must be lowercase"));
    }
    if name.len() > MAX_INDEX_NAME_BYTES {
        return Err(invalid(&format!(
            "index name is too long, ({} > {})",
            name.len(),
            MAX_INDEX_NAME_BYTES
        )));
    }
    Ok(())
}

/// Settings of a resize target: the request's settings plus what is taken
/// from the source
fn resize_settings(source: &IndexMetadata, target: Settings, copy_settings: bool) -> Settings {
    let inherited: Settings = if copy_settings {
        source
            .settings()
            .iter()
            .filter(|(k, _)| !NOT_COPYABLE_ON_RESIZE.contains(k) && !target.contains(k))
            .collect()
    } else {
        source
            .settings()
            .iter()
            .filter(|(k, _)| {
                (k.starts_with("index.similarity.")
                    || k.starts_with("index.analysis.")
                    || k.starts_with("index.sort.")
                    || *k == keys::SOFT_DELETES_ENABLED)
                    && !target.contains(k)
            })
            .collect()
    };
    target
        .merge(&inherited)
        .with(keys::RESIZE_SOURCE_NAME, source.name())
        .with(keys::RESIZE_SOURCE_UUID, source.uuid())
}

/// Validate a resize against `state` and return the source index
fn validate_resize<'a>(
    state: &'a ClusterState,
    request: &CreateIndexUpdateRequest,
    source_ref: &IndexRef,
) -> MasterResult<&'a Arc<IndexMetadata>> {
    let source = state
        .metadata()
        .index(&source_ref.name)
        .filter(|index| index.uuid() == source_ref.uuid)
        .ok_or_else(|| MasterError::IndexNotFound(source_ref.name.clone()))?;

    if !state
        .blocks()
        .is_blocked(ClusterBlockLevel::Write, &BlockScope::Index(source_ref.name.clone()))
    {
        return Err(MasterError::illegal_state(format!(
            "index {} must block write operations to resize index. use \"{}=true\"",
            source_ref.name,
            keys::BLOCKS_WRITE
        )));
    }

    if let Some(resize_type) = request.resize_type {
        let num_shards = request.settings.get_u32(keys::NUMBER_OF_SHARDS)?.ok_or_else(|| {
            MasterError::illegal_argument(format!("{} must be set on resize", keys::NUMBER_OF_SHARDS))
        })?;
        remap(resize_type, &source.layout(), &request.index, num_shards)?;
    }
    Ok(source)
}

/// State transition adding the requested index
pub fn apply_create_index(
    current: &Arc<ClusterState>,
    request: &CreateIndexUpdateRequest,
) -> MasterResult<Arc<ClusterState>> {
    validate_index_name(&request.index)?;
    if current.metadata().has_index(&request.index) {
        return Err(MasterError::IndexAlreadyExists(request.index.clone()));
    }
    for alias in &request.aliases {
        validate_index_name(alias)?;
        if current.metadata().has_index(alias) {
            return Err(MasterError::illegal_argument(format!(
                "Invalid alias name [{}], an index exists with the same name as the alias",
                alias
            )));
        }
    }

    let source = match &request.recover_from {
        Some(source_ref) => Some(validate_resize(current, request, source_ref)?),
        None => None,
    };

    let settings = match source {
        Some(source) => resize_settings(source, request.settings.clone(), request.copy_settings),
        None => request.settings.clone(),
    };

    let num_shards = settings.get_u32(keys::NUMBER_OF_SHARDS)?.unwrap_or(1);
    let routing_num_shards = match source {
        Some(source) if source.number_of_shards() > 1 => source.routing_num_shards(),
        _ => settings
            .get_u32(keys::NUMBER_OF_ROUTING_SHARDS)?
            .unwrap_or_else(|| calculate_num_routing_shards(num_shards)),
    };
    let soft_deletes = settings.get_bool(keys::SOFT_DELETES_ENABLED)?.unwrap_or(true);
    let mut blocks = Vec::new();
    for block in IndexBlock::ALL {
        if settings.get_bool(block.setting())?.unwrap_or(false) {
            blocks.push(block.block());
        }
    }

    let mut builder = IndexMetadata::builder(request.index.clone())
        .number_of_shards(num_shards)
        .routing_num_shards(routing_num_shards)
        .soft_deletes(soft_deletes)
        .aliases(request.aliases.iter().cloned())
        .settings(settings);
    if let (Some(source), Some(resize_type)) = (source, request.resize_type) {
        builder = builder.resize_source(ResizeSource {
            index: source.index_ref(),
            resize_type,
        });
    }
    let index = builder.build()?;

    info!(
        "[{}] creating index, cause [{}], shards [{}]/[{}]",
        request.index, request.cause, num_shards, routing_num_shards
    );

    let metadata = current.metadata().clone().with_index(index);
    let mut next = current.builder().metadata(metadata);
    if !blocks.is_empty() {
        let cluster_blocks = blocks
            .into_iter()
            .fold(next.base_blocks(), |acc, block| acc.with_index_block(&request.index, block));
        next = next.blocks(cluster_blocks);
    }
    Ok(next.build())
}

/// Create-index service submitting to the mutation pipeline
pub struct MetadataCreateIndexService {
    pipeline: Arc<StateMutationPipeline>,
}

impl MetadataCreateIndexService {
    pub fn new(pipeline: Arc<StateMutationPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl CreateIndexService for MetadataCreateIndexService {
    async fn create_index(&self, request: CreateIndexUpdateRequest) -> MasterResult<CreateIndexResponse> {
        let source = format!("create-index [{}], cause [{}]", request.index, request.cause);
        let index = request.index.clone();
        let ack_timeout = request.ack_timeout;

        let ack = self
            .pipeline
            .submit_with_timeout(
                source,
                move |current| apply_create_index(current, &request),
                ack_timeout,
            )
            .await?;

        // Shard allocation is not tracked here: shards count as started once
        // the metadata is committed
        Ok(CreateIndexResponse {
            acknowledged: ack.acknowledged,
            shards_acknowledged: ack.acknowledged,
            index,
        })
    }
}
