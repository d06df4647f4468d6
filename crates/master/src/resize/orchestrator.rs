//! Resize request preparation
//!
//! Turns a [`ResizeRequest`] into a validated [`CreateIndexUpdateRequest`]
//! against the current state and the source's per-shard doc counts. Pure:
//! nothing here touches the cluster state or does I/O.

use shard_core::{
    select_clone_shard, select_shrink_shards, select_split_shard, ResizeType, ShardId,
    MAX_DOCS_PER_SHARD,
};
use std::collections::BTreeSet;

use super::request::{CreateIndexUpdateRequest, ResizeRequest};
use crate::error::{MasterError, MasterResult};
use crate::metadata::{keys, validate_number_of_shards, ClusterState};
use crate::stats::DocsStats;

/// Build the create-index request of a resize, with the default doc ceiling
pub fn prepare_request<F>(
    request: &ResizeRequest,
    state: &ClusterState,
    doc_stats: F,
    source_name: &str,
    target_name: &str,
) -> MasterResult<CreateIndexUpdateRequest>
where
    F: Fn(u32) -> Option<DocsStats>,
{
    prepare_request_with_limit(
        request,
        state,
        doc_stats,
        source_name,
        target_name,
        MAX_DOCS_PER_SHARD,
    )
}

fn shard_list(shards: &BTreeSet<ShardId>) -> String {
    let shards: Vec<String> = shards.iter().map(ToString::to_string).collect();
    format!("[{}]", shards.join(", "))
}

/// Build the create-index request of a resize
///
/// `doc_stats` returns the doc stats of a source shard ordinal, `None` when
/// unknown. A shrink fails once the docs merged into one target shard
/// exceed `max_docs`.
pub fn prepare_request_with_limit<F>(
    request: &ResizeRequest,
    state: &ClusterState,
    doc_stats: F,
    source_name: &str,
    target_name: &str,
    max_docs: u64,
) -> MasterResult<CreateIndexUpdateRequest>
where
    F: Fn(u32) -> Option<DocsStats>,
{
    let source = state
        .metadata()
        .index(source_name)
        .ok_or_else(|| MasterError::IndexNotFound(source_name.to_string()))?;
    let layout = source.layout();

    let mut settings = request
        .target
        .settings
        .clone()
        .normalize_prefix(keys::INDEX_PREFIX);
    settings.remove(keys::HISTORY_UUID);

    let num_shards = match settings.get_u32(keys::NUMBER_OF_SHARDS)? {
        Some(n) => n,
        None => match request.resize_type {
            ResizeType::Shrink => 1,
            ResizeType::Clone => source.number_of_shards(),
            ResizeType::Split => {
                return Err(MasterError::illegal_argument(format!(
                    "{} is required for split operations",
                    keys::NUMBER_OF_SHARDS
                )))
            }
        },
    };
    validate_number_of_shards(num_shards)?;

    for shard in 0..num_shards {
        match request.resize_type {
            ResizeType::Shrink => {
                let shards = select_shrink_shards(shard, &layout, num_shards)?;
                let mut count: u64 = 0;
                for id in &shards {
                    if let Some(stats) = doc_stats(id.id) {
                        count += stats.count;
                    }
                    if count > max_docs {
                        return Err(MasterError::illegal_state(format!(
                            "Can't merge index with more than [{}] docs - too many documents in shards {}",
                            max_docs,
                            shard_list(&shards)
                        )));
                    }
                }
            }
            ResizeType::Split => {
                select_split_shard(shard, &layout, num_shards)?;
            }
            ResizeType::Clone => {
                select_clone_shard(shard, &layout, num_shards)?;
            }
        }
    }

    if settings.contains(keys::ROUTING_PARTITION_SIZE) {
        return Err(MasterError::illegal_argument(
            "cannot provide a routing partition size value when resizing an index",
        ));
    }
    if settings.contains(keys::NUMBER_OF_ROUTING_SHARDS) {
        let split_from_single_shard =
            request.resize_type == ResizeType::Split && source.number_of_shards() == 1;
        if !split_from_single_shard {
            return Err(MasterError::illegal_argument(format!(
                "cannot provide {} on resize",
                keys::NUMBER_OF_ROUTING_SHARDS
            )));
        }
    }
    if source.soft_deletes() && settings.get_bool(keys::SOFT_DELETES_ENABLED)? == Some(false) {
        return Err(MasterError::illegal_argument(format!(
            "Can't disable [{}] setting on resize",
            keys::SOFT_DELETES_ENABLED
        )));
    }

    settings.put(keys::NUMBER_OF_SHARDS, num_shards);

    Ok(CreateIndexUpdateRequest {
        cause: request.resize_type.cause(),
        index: target_name.to_string(),
        settings,
        aliases: request.target.aliases.clone(),
        wait_for_active_shards: request.target.wait_for_active_shards,
        recover_from: Some(source.index_ref()),
        resize_type: Some(request.resize_type),
        copy_settings: request.copy_settings.unwrap_or(false),
        ack_timeout: request.target.ack_timeout(),
        master_node_timeout: request.target.master_node_timeout(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DiscoveryNode, DiscoveryNodes, IndexMetadata, Settings, Version};
    use crate::resize::request::CreateIndexRequest;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn state_with(index: IndexMetadata) -> Arc<ClusterState> {
        let node = DiscoveryNode::new("n1", "127.0.0.1:9200", Version::CURRENT);
        let state = ClusterState::initial("test", DiscoveryNodes::single(node));
        state
            .builder()
            .metadata(state.metadata().clone().with_index(index))
            .build()
    }

    fn logs(shards: u32) -> Arc<ClusterState> {
        state_with(IndexMetadata::builder("logs").number_of_shards(shards).build().unwrap())
    }

    fn resize(resize_type: ResizeType, settings: Settings) -> ResizeRequest {
        ResizeRequest::new(
            resize_type,
            "logs",
            CreateIndexRequest::new("target").settings(settings),
        )
    }

    fn no_stats(_: u32) -> Option<DocsStats> {
        None
    }

    #[test]
    fn test_shrink_defaults_to_one_shard() {
        let state = logs(4);
        let request = resize(ResizeType::Shrink, Settings::new());
        let prepared = prepare_request(&request, &state, no_stats, "logs", "target").unwrap();

        assert_eq!(prepared.cause, "shrink_index");
        assert_eq!(prepared.index, "target");
        assert_eq!(prepared.settings.get(keys::NUMBER_OF_SHARDS), Some("1"));
        assert_eq!(prepared.recover_from.unwrap().name, "logs");
        assert_eq!(prepared.resize_type, Some(ResizeType::Shrink));
        assert!(!prepared.copy_settings);
    }

    #[test]
    fn test_clone_defaults_to_source_shards_and_normalizes_settings() {
        let state = logs(3);
        let settings = Settings::new()
            .with("number_of_replicas", 2)
            .with(keys::HISTORY_UUID, "abc");
        let prepared =
            prepare_request(&resize(ResizeType::Clone, settings), &state, no_stats, "logs", "target")
                .unwrap();

        assert_eq!(prepared.settings.get(keys::NUMBER_OF_SHARDS), Some("3"));
        assert_eq!(prepared.settings.get("index.number_of_replicas"), Some("2"));
        assert!(!prepared.settings.contains(keys::HISTORY_UUID));
    }

    #[test]
    fn test_shrink_doc_ceiling() {
        let state = logs(4);
        let counts: HashMap<u32, DocsStats> = (0..4).map(|i| (i, DocsStats::new(60))).collect();
        let stats = |shard: u32| counts.get(&shard).copied();
        let request = resize(ResizeType::Shrink, Settings::new().with("number_of_shards", 2));

        assert!(prepare_request_with_limit(&request, &state, stats, "logs", "target", 120).is_ok());
        let err =
            prepare_request_with_limit(&request, &state, stats, "logs", "target", 100).unwrap_err();
        assert_eq!(
            err,
            MasterError::IllegalState(
                "Can't merge index with more than [100] docs - too many documents in shards [[logs][0], [logs][1]]"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_shrink_ceiling_uses_storage_limit_by_default() {
        let state = logs(2);
        let stats = |_: u32| Some(DocsStats::new(MAX_DOCS_PER_SHARD / 2 + 1));
        let request = resize(ResizeType::Shrink, Settings::new());
        assert!(matches!(
            prepare_request(&request, &state, stats, "logs", "target"),
            Err(MasterError::IllegalState(_))
        ));
    }

    #[test]
    fn test_missing_source() {
        let state = logs(2);
        let err = prepare_request(
            &resize(ResizeType::Shrink, Settings::new()),
            &state,
            no_stats,
            "missing",
            "target",
        )
        .unwrap_err();
        assert_eq!(err, MasterError::IndexNotFound("missing".to_string()));
    }

    #[test]
    fn test_infeasible_counts() {
        let state = logs(3);
        let err = prepare_request(
            &resize(ResizeType::Shrink, Settings::new().with(keys::NUMBER_OF_SHARDS, 2)),
            &state,
            no_stats,
            "logs",
            "target",
        )
        .unwrap_err();
        assert!(matches!(err, MasterError::RemapInfeasible(_)));

        let err = prepare_request(
            &resize(ResizeType::Clone, Settings::new().with(keys::NUMBER_OF_SHARDS, 4)),
            &state,
            no_stats,
            "logs",
            "target",
        )
        .unwrap_err();
        assert!(matches!(err, MasterError::RemapInfeasible(_)));
    }

    #[test]
    fn test_settings_checks() {
        let state = logs(2);
        let cases = [
            (
                ResizeType::Shrink,
                Settings::new().with("routing_partition_size", 2),
                "cannot provide a routing partition size value when resizing an index",
            ),
            (
                ResizeType::Split,
                Settings::new()
                    .with(keys::NUMBER_OF_SHARDS, 4)
                    .with(keys::NUMBER_OF_ROUTING_SHARDS, 8),
                "cannot provide index.number_of_routing_shards on resize",
            ),
            (
                ResizeType::Clone,
                Settings::new().with(keys::SOFT_DELETES_ENABLED, false),
                "Can't disable [index.soft_deletes.enabled] setting on resize",
            ),
        ];
        for (resize_type, settings, message) in cases {
            let err = prepare_request(&resize(resize_type, settings), &state, no_stats, "logs", "target")
                .unwrap_err();
            assert_eq!(err, MasterError::IllegalArgument(message.to_string()));
        }
    }

    #[test]
    fn test_target_shard_count_bounds() {
        let cases = [
            (ResizeType::Shrink, 4, 0, "Failed to parse value [0] for setting [index.number_of_shards] must be >= 1"),
            (ResizeType::Split, 1, 0, "Failed to parse value [0] for setting [index.number_of_shards] must be >= 1"),
            (ResizeType::Clone, 2, 0, "Failed to parse value [0] for setting [index.number_of_shards] must be >= 1"),
            (
                ResizeType::Split,
                1,
                5_000_000,
                "Failed to parse value [5000000] for setting [index.number_of_shards] must be <= 1024",
            ),
        ];
        for (resize_type, source_shards, target_shards, message) in cases {
            let state = logs(source_shards);
            let request = resize(
                resize_type,
                Settings::new().with(keys::NUMBER_OF_SHARDS, target_shards),
            );
            let err = prepare_request(&request, &state, no_stats, "logs", "target").unwrap_err();
            assert_eq!(err, MasterError::IllegalArgument(message.to_string()));
        }

        let request = resize(ResizeType::Split, Settings::new().with(keys::NUMBER_OF_SHARDS, 1024));
        assert!(prepare_request(&request, &logs(1), no_stats, "logs", "target").is_ok());
    }

    #[test]
    fn test_split_without_shard_count() {
        let state = logs(1);
        let err = prepare_request(&resize(ResizeType::Split, Settings::new()), &state, no_stats, "logs", "target")
            .unwrap_err();
        assert!(matches!(err, MasterError::IllegalArgument(_)));
    }

    #[test]
    fn test_split_single_shard_allows_routing_shards() {
        let state = logs(1);
        let settings = Settings::new()
            .with(keys::NUMBER_OF_SHARDS, 3)
            .with(keys::NUMBER_OF_ROUTING_SHARDS, 6);
        let prepared =
            prepare_request(&resize(ResizeType::Split, settings), &state, no_stats, "logs", "target")
                .unwrap();
        assert_eq!(prepared.cause, "split_index");
        assert_eq!(prepared.settings.get(keys::NUMBER_OF_ROUTING_SHARDS), Some("6"));
    }
}
