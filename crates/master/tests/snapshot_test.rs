mod common;

use std::sync::Arc;
use std::time::Duration;

use master::action::CloneSnapshotAction;
use master::metadata::{ClusterBlock, ClusterState};
use master::snapshot::{
    ClusterSnapshotService, CloneSnapshotRequest, SnapshotInfo, SnapshotState, SnapshotsMetadata,
};
use master::MasterError;

fn clone_request(target: &str) -> CloneSnapshotRequest {
    CloneSnapshotRequest {
        repository: "backups".to_string(),
        source: "nightly".to_string(),
        target: target.to_string(),
        indices: vec!["logs-*".to_string()],
    }
}

fn snapshot_state(state: &ClusterState, name: &str) -> Option<SnapshotState> {
    state
        .metadata()
        .custom::<SnapshotsMetadata>()
        .and_then(|s| s.snapshot("backups", name))
        .map(|s| s.state)
}

#[tokio::test]
async fn test_clone_snapshot_is_acknowledged_then_completed() {
    let pipeline = common::start_pipeline(common::initial_state(common::single_master()));
    let service = Arc::new(ClusterSnapshotService::new(pipeline.clone()));
    service.put_repository("backups").await.unwrap();
    service
        .register_snapshot(
            "backups",
            SnapshotInfo::completed("nightly", ["logs-1", "logs-2", "metrics"]),
        )
        .await
        .unwrap();

    let dispatcher = common::dispatcher(&pipeline, None);
    let action = CloneSnapshotAction::new(service.clone());
    let response = dispatcher.handle(&action, clone_request("partial")).await.unwrap();
    assert!(response.acknowledged);

    // completion is a separate task submitted in the background
    let mut state = pipeline.state();
    for _ in 0..10 {
        if snapshot_state(&state, "partial") == Some(SnapshotState::Success) {
            break;
        }
        state = pipeline
            .watcher()
            .wait_for(pipeline.store().as_ref(), state.version(), Duration::from_millis(200))
            .await;
    }
    assert_eq!(snapshot_state(&state, "partial"), Some(SnapshotState::Success));

    let clone = state
        .metadata()
        .custom::<SnapshotsMetadata>()
        .and_then(|s| s.snapshot("backups", "partial"))
        .cloned()
        .unwrap();
    assert_eq!(clone.cloned_from.as_deref(), Some("nightly"));
    assert_eq!(clone.indices.len(), 2);
}

#[tokio::test]
async fn test_clone_of_missing_snapshot() {
    let pipeline = common::start_pipeline(common::initial_state(common::single_master()));
    let service = Arc::new(ClusterSnapshotService::new(pipeline.clone()));
    service.put_repository("backups").await.unwrap();

    let dispatcher = common::dispatcher(&pipeline, None);
    let action = CloneSnapshotAction::new(service);
    let err = dispatcher.handle(&action, clone_request("copy")).await.unwrap_err();
    assert!(matches!(err, MasterError::ResourceNotFound(_)));
}

#[tokio::test]
async fn test_clone_blocked_by_global_metadata_read_block() {
    let state = common::initial_state(common::single_master());
    let blocked = state
        .builder()
        .blocks(state.blocks().clone().with_global_block(ClusterBlock::state_not_recovered()))
        .build();
    let pipeline = common::start_pipeline(blocked);
    let service = Arc::new(ClusterSnapshotService::new(pipeline.clone()));

    let dispatcher = common::dispatcher(&pipeline, None);
    let action = CloneSnapshotAction::new(service);
    let err = dispatcher.handle(&action, clone_request("copy")).await.unwrap_err();
    assert!(matches!(err, MasterError::ClusterBlocked { retryable: true, .. }));
}
