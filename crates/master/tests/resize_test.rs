mod common;

use chrono::Utc;
use std::sync::Arc;

use common::mock::{FailingStats, RecordingCreateIndex};
use master::action::ResizeAction;
use master::date_math::resolve_date_math;
use master::metadata::{keys, Settings};
use master::resize::{CreateIndexRequest, MetadataCreateIndexService, ResizeRequest};
use master::stats::{DocsStats, InMemoryDocStats};
use master::MasterError;
use shard_core::{remap, ResizeType, ShardId};

fn resize_action(pipeline: &Arc<master::StateMutationPipeline>, stats: Arc<InMemoryDocStats>) -> ResizeAction {
    ResizeAction::new(stats, Arc::new(MetadataCreateIndexService::new(pipeline.clone())))
}

fn request(resize_type: ResizeType, target: &str, settings: Settings) -> ResizeRequest {
    ResizeRequest::new(
        resize_type,
        "logs",
        CreateIndexRequest::new(target).settings(settings),
    )
}

#[tokio::test]
async fn test_shrink_four_shards_into_two() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 4);
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let stats = Arc::new(InMemoryDocStats::new());
    for shard in 0..4 {
        stats.report("logs", shard, DocsStats::new(1000));
    }
    let action = resize_action(&pipeline, stats);

    let response = dispatcher
        .handle(
            &action,
            request(ResizeType::Shrink, "small", Settings::new().with("number_of_shards", 2)),
        )
        .await
        .unwrap();
    assert!(response.acknowledged);
    assert!(response.shards_acknowledged);
    assert_eq!(response.index, "small");

    let state = pipeline.state();
    let source = state.metadata().index("logs").unwrap();
    let target = state.metadata().index("small").unwrap();
    assert_eq!(target.number_of_shards(), 2);
    assert_eq!(target.resize_source().unwrap().index, source.index_ref());

    let map = remap(ResizeType::Shrink, &source.layout(), "small", 2).unwrap();
    let sources = |shard: u32| -> Vec<ShardId> {
        map.sources_for(&ShardId::new("small", shard))
            .unwrap()
            .iter()
            .cloned()
            .collect()
    };
    assert_eq!(sources(0), vec![ShardId::new("logs", 0), ShardId::new("logs", 1)]);
    assert_eq!(sources(1), vec![ShardId::new("logs", 2), ShardId::new("logs", 3)]);
    assert!(map.is_partition_of(&source.layout()));
}

#[tokio::test]
async fn test_split_single_shard_into_three() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 1);
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let action = resize_action(&pipeline, Arc::new(InMemoryDocStats::new()));

    let settings = Settings::new()
        .with(keys::NUMBER_OF_SHARDS, 3)
        .with(keys::NUMBER_OF_ROUTING_SHARDS, 6);
    let response = dispatcher
        .handle(&action, request(ResizeType::Split, "big", settings))
        .await
        .unwrap();
    assert!(response.acknowledged);

    let state = pipeline.state();
    let source = state.metadata().index("logs").unwrap();
    let target = state.metadata().index("big").unwrap();
    assert_eq!(target.number_of_shards(), 3);
    assert_eq!(target.routing_num_shards(), 6);

    let map = remap(ResizeType::Split, &source.layout(), "big", 3).unwrap();
    for shard in 0..3 {
        let sources = map.sources_for(&ShardId::new("big", shard)).unwrap();
        assert_eq!(sources.iter().cloned().collect::<Vec<_>>(), vec![ShardId::new("logs", 0)]);
    }
}

#[tokio::test]
async fn test_routing_partition_size_is_rejected_without_mutation() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 4);
    let version = state.version();
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let action = resize_action(&pipeline, Arc::new(InMemoryDocStats::new()));

    let settings = Settings::new()
        .with(keys::NUMBER_OF_SHARDS, 2)
        .with(keys::ROUTING_PARTITION_SIZE, 2);
    let err = dispatcher
        .handle(&action, request(ResizeType::Shrink, "small", settings))
        .await
        .unwrap_err();

    assert!(matches!(err, MasterError::IllegalArgument(_)));
    assert_eq!(pipeline.state().version(), version);
    assert!(!pipeline.state().metadata().has_index("small"));
}

#[tokio::test]
async fn test_invalid_target_shard_counts_leave_state_unchanged() {
    let cases = [
        (ResizeType::Shrink, 4, 0),
        (ResizeType::Split, 1, 0),
        (ResizeType::Clone, 4, 0),
        (ResizeType::Split, 1, 5_000_000),
        (ResizeType::Split, 4, 2048),
    ];
    for (resize_type, source_shards, target_shards) in cases {
        let state = common::with_resizable_index(
            &common::initial_state(common::single_master()),
            "logs",
            source_shards,
        );
        let version = state.version();
        let pipeline = common::start_pipeline(state);
        let dispatcher = common::dispatcher(&pipeline, None);
        let action = resize_action(&pipeline, Arc::new(InMemoryDocStats::new()));

        let settings = Settings::new().with(keys::NUMBER_OF_SHARDS, target_shards);
        let err = dispatcher
            .handle(&action, request(resize_type, "target", settings))
            .await
            .unwrap_err();

        assert!(
            matches!(err, MasterError::IllegalArgument(_)),
            "{resize_type} {source_shards} -> {target_shards}: {err:?}"
        );
        assert_eq!(pipeline.state().version(), version);
        assert!(!pipeline.state().metadata().has_index("target"));
    }
}

#[tokio::test]
async fn test_shrink_to_non_factor_leaves_state_unchanged() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 6);
    let version = state.version();
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let action = resize_action(&pipeline, Arc::new(InMemoryDocStats::new()));

    let err = dispatcher
        .handle(
            &action,
            request(ResizeType::Shrink, "small", Settings::new().with(keys::NUMBER_OF_SHARDS, 4)),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MasterError::RemapInfeasible(shard_core::RemapError::NotAMultiple {
            num_source: 6,
            num_target: 4
        })
    );
    assert_eq!(pipeline.state().version(), version);
    assert!(!pipeline.state().metadata().has_index("small"));
}

#[tokio::test]
async fn test_shrink_above_doc_ceiling_is_rejected() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 4);
    let version = state.version();
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let stats = Arc::new(InMemoryDocStats::new());
    for shard in 0..4 {
        stats.report("logs", shard, DocsStats::new(60));
    }
    let action = resize_action(&pipeline, stats).with_max_docs_per_shard(100);

    let err = dispatcher
        .handle(
            &action,
            request(ResizeType::Shrink, "small", Settings::new().with(keys::NUMBER_OF_SHARDS, 2)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MasterError::IllegalState(_)));
    assert_eq!(pipeline.state().version(), version);
}

#[tokio::test]
async fn test_stats_failure_aborts_resize() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 2);
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let create_index = Arc::new(RecordingCreateIndex::default());
    let action = ResizeAction::new(Arc::new(FailingStats), create_index.clone());

    let err = dispatcher
        .handle(&action, request(ResizeType::Shrink, "small", Settings::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, MasterError::Transport(_)));
    assert!(create_index.requests().is_empty());
}

#[tokio::test]
async fn test_prepared_request_reaches_create_index_service() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 3);
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let create_index = Arc::new(RecordingCreateIndex::default());
    let action = ResizeAction::new(Arc::new(InMemoryDocStats::new()), create_index.clone());

    let mut resize = request(ResizeType::Clone, "copy", Settings::new().with("number_of_replicas", 1));
    resize.copy_settings = Some(true);
    dispatcher.handle(&action, resize).await.unwrap();

    let requests = create_index.requests();
    assert_eq!(requests.len(), 1);
    let prepared = &requests[0];
    assert_eq!(prepared.cause, "clone_index");
    assert_eq!(prepared.index, "copy");
    assert_eq!(prepared.resize_type, Some(ResizeType::Clone));
    assert!(prepared.copy_settings);
    assert_eq!(prepared.settings.get(keys::NUMBER_OF_SHARDS), Some("3"));
    assert_eq!(prepared.settings.get("index.number_of_replicas"), Some("1"));
    assert_eq!(prepared.recover_from.as_ref().unwrap().name, "logs");
}

#[tokio::test]
async fn test_resize_requires_write_block_on_source() {
    let base = common::initial_state(common::single_master());
    let state = common::with_index(&base, "logs", 4, Settings::new());
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let action = resize_action(&pipeline, Arc::new(InMemoryDocStats::new()));

    let err = dispatcher
        .handle(&action, request(ResizeType::Shrink, "small", Settings::new()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        MasterError::IllegalState(
            "index logs must block write operations to resize index. use \"index.blocks.write=true\""
                .to_string()
        )
    );
}

#[tokio::test]
async fn test_resize_into_existing_index() {
    let base = common::initial_state(common::single_master());
    let state = common::with_resizable_index(&base, "logs", 2);
    let state = common::with_index(&state, "small", 1, Settings::new());
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let action = resize_action(&pipeline, Arc::new(InMemoryDocStats::new()));

    let err = dispatcher
        .handle(&action, request(ResizeType::Shrink, "small", Settings::new()))
        .await
        .unwrap_err();
    assert_eq!(err, MasterError::IndexAlreadyExists("small".to_string()));
}

#[tokio::test]
async fn test_date_math_target_name() {
    let state = common::with_resizable_index(&common::initial_state(common::single_master()), "logs", 2);
    let pipeline = common::start_pipeline(state);
    let dispatcher = common::dispatcher(&pipeline, None);
    let action = resize_action(&pipeline, Arc::new(InMemoryDocStats::new()));

    let response = dispatcher
        .handle(&action, request(ResizeType::Shrink, "<small-{now/d}>", Settings::new()))
        .await
        .unwrap();

    let expected = resolve_date_math("<small-{now/d}>", Utc::now()).unwrap();
    assert_eq!(response.index, expected);
    assert!(pipeline.state().metadata().has_index(&expected));
}
