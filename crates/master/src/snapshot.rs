//! Snapshot bookkeeping and snapshot cloning
//!
//! Repositories and their snapshots are tracked in the `snapshots` custom
//! metadata slot. A clone is accepted by one pipeline task, which registers
//! the target snapshot as in progress, and finished by a follow-up task
//! submitted from a background tokio task. The caller is acknowledged on
//! acceptance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{MasterError, MasterResult};
use crate::metadata::ClusterState;
use crate::pipeline::StateMutationPipeline;
use crate::wildcard;

/// Lifecycle of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotState {
    InProgress,
    Success,
    Failed,
}

/// One snapshot in a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub name: String,
    pub uuid: String,
    pub indices: BTreeSet<String>,
    pub state: SnapshotState,
    /// Snapshot this one was cloned from
    #[serde(default)]
    pub cloned_from: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl SnapshotInfo {
    /// A finished snapshot of `indices`
    pub fn completed<I, S>(name: impl Into<String>, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        Self {
            name: name.into(),
            uuid: uuid::Uuid::new_v4().simple().to_string(),
            indices: indices.into_iter().map(Into::into).collect(),
            state: SnapshotState::Success,
            cloned_from: None,
            start_time: now,
            end_time: Some(now),
        }
    }
}

/// Snapshots of one repository, by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub snapshots: BTreeMap<String, SnapshotInfo>,
}

/// Contents of the `snapshots` custom slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotsMetadata {
    repositories: BTreeMap<String, RepositoryMetadata>,
}

impl SnapshotsMetadata {
    pub fn repository(&self, name: &str) -> Option<&RepositoryMetadata> {
        self.repositories.get(name)
    }

    pub fn snapshot(&self, repository: &str, name: &str) -> Option<&SnapshotInfo> {
        self.repositories.get(repository)?.snapshots.get(name)
    }

    pub fn with_repository(mut self, name: impl Into<String>) -> Self {
        self.repositories.entry(name.into()).or_default();
        self
    }

    pub fn with_snapshot(mut self, repository: &str, snapshot: SnapshotInfo) -> Self {
        self.repositories
            .entry(repository.to_string())
            .or_default()
            .snapshots
            .insert(snapshot.name.clone(), snapshot);
        self
    }

    /// Snapshots still running, as (repository, name)
    pub fn in_progress(&self) -> impl Iterator<Item = (&str, &str)> {
        self.repositories.iter().flat_map(|(repo, data)| {
            data.snapshots
                .values()
                .filter(|s| s.state == SnapshotState::InProgress)
                .map(move |s| (repo.as_str(), s.name.as_str()))
        })
    }
}

/// Request to clone (part of) an existing snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneSnapshotRequest {
    pub repository: String,
    pub source: String,
    pub target: String,
    /// Index patterns to clone; `-pattern` excludes
    #[serde(default)]
    pub indices: Vec<String>,
}

/// Snapshot collaborator
#[async_trait]
pub trait SnapshotService: Send + Sync {
    /// Accept a clone; `Ok` once the clone is registered
    async fn clone_snapshot(&self, request: CloneSnapshotRequest) -> MasterResult<()>;
}

fn snapshots(state: &ClusterState) -> SnapshotsMetadata {
    state
        .metadata()
        .custom::<SnapshotsMetadata>()
        .cloned()
        .unwrap_or_default()
}

fn with_snapshots(state: &Arc<ClusterState>, snapshots: SnapshotsMetadata) -> Arc<ClusterState> {
    let metadata = state.metadata().clone().with_custom(snapshots);
    state.builder().metadata(metadata).build()
}

/// Same rules as index names, plus no uppercase
fn validate_snapshot_name(repository: &str, name: &str) -> MasterResult<()> {
    let invalid = |reason: &str| {
        MasterError::illegal_argument(format!(
            "[{}:{}] Invalid snapshot name [{}], {}",
            repository, name, name, reason
        ))
    };
    if name.is_empty() {
        return Err(invalid("cannot be empty"));
    }
    if name.contains(['#', ' ', ',', '\\', '/', '*', '?', '"', '<', '>', '|']) {
        return Err(invalid("must not contain whitespace or the characters [\\, /, *, ?, \", <, >, |, #, ,]"));
    }
    if name.starts_with('_') {
        return Err(invalid("must not start with '_'"));
    }
    if name.chars().any(|c| c.is_uppercase()) {
        return Err(invalid("must be lowercase"));
    }
    Ok(())
}

/// Register the clone target as in progress
pub fn start_clone(
    current: &Arc<ClusterState>,
    request: &CloneSnapshotRequest,
) -> MasterResult<Arc<ClusterState>> {
    validate_snapshot_name(&request.repository, &request.target)?;

    let snapshots = snapshots(current);
    let repository = snapshots.repository(&request.repository).ok_or_else(|| {
        MasterError::ResourceNotFound(format!("[{}] missing", request.repository))
    })?;
    let source = repository.snapshots.get(&request.source).ok_or_else(|| {
        MasterError::ResourceNotFound(format!("[{}:{}] is missing", request.repository, request.source))
    })?;
    if source.state != SnapshotState::Success {
        return Err(MasterError::illegal_state(format!(
            "[{}:{}] cannot clone a snapshot that is not successfully completed",
            request.repository, request.source
        )));
    }
    if repository.snapshots.contains_key(&request.target) {
        return Err(MasterError::illegal_argument(format!(
            "[{}:{}] Invalid snapshot name [{}], snapshot with the same name already exists",
            request.repository, request.target, request.target
        )));
    }

    let indices: BTreeSet<String> =
        wildcard::resolve(&request.indices, source.indices.iter().map(String::as_str))
            .into_iter()
            .map(str::to_string)
            .collect();
    if indices.is_empty() {
        return Err(MasterError::illegal_argument(format!(
            "No indices in the source snapshot [{}] matched requested pattern [{}]",
            request.source,
            request.indices.join(", ")
        )));
    }

    let target = SnapshotInfo {
        name: request.target.clone(),
        uuid: uuid::Uuid::new_v4().simple().to_string(),
        indices,
        state: SnapshotState::InProgress,
        cloned_from: Some(request.source.clone()),
        start_time: Utc::now(),
        end_time: None,
    };
    Ok(with_snapshots(
        current,
        snapshots.with_snapshot(&request.repository, target),
    ))
}

/// Mark an in-progress snapshot finished
///
/// A snapshot that vanished or already finished leaves the state untouched.
pub fn finish_snapshot(
    current: &Arc<ClusterState>,
    repository: &str,
    name: &str,
    state: SnapshotState,
) -> MasterResult<Arc<ClusterState>> {
    let snapshots = snapshots(current);
    let Some(snapshot) = snapshots.snapshot(repository, name) else {
        return Ok(current.clone());
    };
    if snapshot.state != SnapshotState::InProgress {
        return Ok(current.clone());
    }
    let mut finished = snapshot.clone();
    finished.state = state;
    finished.end_time = Some(Utc::now());
    Ok(with_snapshots(current, snapshots.with_snapshot(repository, finished)))
}

/// Snapshot service backed by the cluster state
pub struct ClusterSnapshotService {
    pipeline: Arc<StateMutationPipeline>,
}

impl ClusterSnapshotService {
    pub fn new(pipeline: Arc<StateMutationPipeline>) -> Self {
        Self { pipeline }
    }

    /// Register a repository
    pub async fn put_repository(&self, name: &str) -> MasterResult<()> {
        let repository = name.to_string();
        self.pipeline
            .submit(format!("put_repository [{}]", name), move |current| {
                let snapshots = snapshots(current);
                if snapshots.repository(&repository).is_some() {
                    return Ok(current.clone());
                }
                Ok(with_snapshots(current, snapshots.with_repository(repository)))
            })
            .await?;
        Ok(())
    }

    /// Record a finished snapshot found in a repository
    pub async fn register_snapshot(&self, repository: &str, snapshot: SnapshotInfo) -> MasterResult<()> {
        let repository = repository.to_string();
        self.pipeline
            .submit(
                format!("register_snapshot [{}:{}]", repository, snapshot.name),
                move |current| {
                    let snapshots = snapshots(current);
                    if snapshots.repository(&repository).is_none() {
                        return Err(MasterError::ResourceNotFound(format!("[{}] missing", repository)));
                    }
                    Ok(with_snapshots(current, snapshots.with_snapshot(&repository, snapshot)))
                },
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotService for ClusterSnapshotService {
    async fn clone_snapshot(&self, request: CloneSnapshotRequest) -> MasterResult<()> {
        let source = format!(
            "clone-snapshot [{}:{}] -> [{}]",
            request.repository, request.source, request.target
        );
        let accepted = request.clone();
        self.pipeline
            .submit(source, move |current| start_clone(current, &accepted))
            .await?;
        info!(
            "snapshot clone [{}:{}] started from [{}]",
            request.repository, request.target, request.source
        );

        // Data copy happens in the repository; only the completion is a
        // metadata transition
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let CloneSnapshotRequest {
                repository, target, ..
            } = request;
            let source = format!("complete clone [{}:{}]", repository, target);
            let (repo, name) = (repository.clone(), target.clone());
            let result = pipeline
                .submit(source, move |current| {
                    finish_snapshot(current, &repo, &name, SnapshotState::Success)
                })
                .await;
            match result {
                Ok(_) => info!("snapshot clone [{}:{}] completed", repository, target),
                Err(e) => warn!("failed to complete snapshot clone [{}:{}]: {}", repository, target, e),
            }
        });

        Ok(())
    }
}
