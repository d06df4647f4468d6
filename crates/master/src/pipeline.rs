//! Cluster state mutation pipeline
//!
//! A single worker drains a bounded queue of named tasks. Each task computes a
//! new state from the latest committed one; tasks never run concurrently and
//! each observes the result of the task before it.
//!
//! Outcomes per task:
//! - same `Arc` returned: successful no-op, nothing is committed
//! - strictly newer version: committed through the [`StateStore`], then acked
//! - anything else: rejected as an illegal state
//!
//! A task that panics fails on its own; the worker keeps draining the queue.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{MasterError, MasterResult};
use crate::metadata::ClusterState;
use crate::state::{StateStore, StateVersionWatcher};

/// Default capacity of the task queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Pure state transition run by the pipeline worker
pub type ComputeFn =
    Box<dyn FnOnce(&Arc<ClusterState>) -> MasterResult<Arc<ClusterState>> + Send + 'static>;

/// Result of one executed task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Task source, e.g. `create-index [logs], cause [api]`
    pub source: String,
    pub previous_version: u64,
    /// Version after the task; equal to `previous_version` for a no-op
    pub version: u64,
    pub state: Arc<ClusterState>,
}

impl TaskOutcome {
    /// Whether the task committed a new state
    pub fn changed(&self) -> bool {
        self.version != self.previous_version
    }
}

/// Acknowledgment of a task submitted with an ack timeout
#[derive(Debug, Clone)]
pub struct Acknowledgement {
    /// False when the timeout elapsed before the task finished
    pub acknowledged: bool,
    /// Present when acknowledged
    pub outcome: Option<TaskOutcome>,
}

struct Task {
    source: String,
    compute: ComputeFn,
    ack: oneshot::Sender<MasterResult<TaskOutcome>>,
}

/// Single-writer task queue over the state store
pub struct StateMutationPipeline {
    sender: mpsc::Sender<Task>,
    store: Arc<dyn StateStore>,
    watcher: StateVersionWatcher,
    stepped_down: Arc<AtomicBool>,
}

impl StateMutationPipeline {
    /// Start the worker and return the submission handle
    pub fn start(
        store: Arc<dyn StateStore>,
        watcher: StateVersionWatcher,
        queue_capacity: usize,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let stepped_down = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_worker(
            receiver,
            store.clone(),
            watcher.clone(),
            stepped_down.clone(),
        ));

        Arc::new(Self {
            sender,
            store,
            watcher,
            stepped_down,
        })
    }

    /// Latest committed state
    pub fn state(&self) -> Arc<ClusterState> {
        self.store.current()
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn watcher(&self) -> &StateVersionWatcher {
        &self.watcher
    }

    /// Submit a task and wait until it is committed, skipped as a no-op or
    /// rejected
    pub async fn submit<F>(&self, source: impl Into<String>, compute: F) -> MasterResult<TaskOutcome>
    where
        F: FnOnce(&Arc<ClusterState>) -> MasterResult<Arc<ClusterState>> + Send + 'static,
    {
        let receiver = self.enqueue(source.into(), Box::new(compute)).await?;
        receiver
            .await
            .map_err(|_| MasterError::illegal_state("mutation pipeline dropped the task"))?
    }

    /// Like [`submit`](Self::submit), but gives up waiting after `timeout`.
    ///
    /// A timed-out task stays queued and may still commit later; the caller
    /// just receives `acknowledged = false`.
    pub async fn submit_with_timeout<F>(
        &self,
        source: impl Into<String>,
        compute: F,
        timeout: Duration,
    ) -> MasterResult<Acknowledgement>
    where
        F: FnOnce(&Arc<ClusterState>) -> MasterResult<Arc<ClusterState>> + Send + 'static,
    {
        let source = source.into();
        let receiver = self.enqueue(source.clone(), Box::new(compute)).await?;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(result) => {
                let outcome = result
                    .map_err(|_| MasterError::illegal_state("mutation pipeline dropped the task"))??;
                Ok(Acknowledgement {
                    acknowledged: true,
                    outcome: Some(outcome),
                })
            }
            Err(_) => {
                warn!("Task [{}] not acknowledged within {:?}", source, timeout);
                Ok(Acknowledgement {
                    acknowledged: false,
                    outcome: None,
                })
            }
        }
    }

    /// Give up mastership: every queued and future task fails with `NotMaster`
    pub fn step_down(&self) {
        if !self.stepped_down.swap(true, Ordering::SeqCst) {
            info!("Master stepped down, failing queued tasks");
        }
    }

    pub fn is_stepped_down(&self) -> bool {
        self.stepped_down.load(Ordering::SeqCst)
    }

    async fn enqueue(
        &self,
        source: String,
        compute: ComputeFn,
    ) -> MasterResult<oneshot::Receiver<MasterResult<TaskOutcome>>> {
        if self.is_stepped_down() {
            return Err(not_master(&self.store.current()));
        }
        let (ack, receiver) = oneshot::channel();
        debug!("Submitting task [{}]", source);
        self.sender
            .send(Task {
                source,
                compute,
                ack,
            })
            .await
            .map_err(|_| MasterError::illegal_state("mutation pipeline is closed"))?;
        Ok(receiver)
    }
}

fn not_master(state: &ClusterState) -> MasterError {
    MasterError::NotMaster {
        local_node: state.nodes().local_node_id().clone(),
        master_node: state.nodes().master_node_id().cloned(),
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Task>,
    store: Arc<dyn StateStore>,
    watcher: StateVersionWatcher,
    stepped_down: Arc<AtomicBool>,
) {
    while let Some(task) = receiver.recv().await {
        let source = task.source.clone();
        let result = execute_task(&store, &watcher, &stepped_down, task.source, task.compute).await;
        match &result {
            Ok(outcome) if outcome.changed() => info!(
                "Task [{}] committed cluster state version {} (from {})",
                source, outcome.version, outcome.previous_version
            ),
            Ok(outcome) => debug!(
                "Task [{}] left cluster state version {} unchanged",
                source, outcome.version
            ),
            Err(e) => debug!("Task [{}] rejected: {}", source, e),
        }
        // The submitter may have stopped waiting
        let _ = task.ack.send(result);
    }
    debug!("Mutation pipeline worker stopped");
}

async fn execute_task(
    store: &Arc<dyn StateStore>,
    watcher: &StateVersionWatcher,
    stepped_down: &AtomicBool,
    source: String,
    compute: ComputeFn,
) -> MasterResult<TaskOutcome> {
    let current = store.current();
    if stepped_down.load(Ordering::SeqCst) || !current.nodes().is_local_node_elected_master() {
        return Err(not_master(&current));
    }

    let new_state = match catch_unwind(AssertUnwindSafe(|| compute(&current))) {
        Ok(result) => result?,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!("Task [{}] panicked: {}", source, reason);
            return Err(MasterError::illegal_state(format!(
                "task [{}] panicked: {}",
                source, reason
            )));
        }
    };

    if Arc::ptr_eq(&current, &new_state) {
        return Ok(TaskOutcome {
            source,
            previous_version: current.version(),
            version: current.version(),
            state: current,
        });
    }

    if new_state.version() <= current.version() {
        return Err(MasterError::illegal_state(format!(
            "task [{}] produced cluster state version [{}] which is not newer than [{}]",
            source,
            new_state.version(),
            current.version()
        )));
    }

    store
        .compare_and_replace(current.version(), new_state.clone())
        .await?;
    watcher.notify_version(new_state.version()).await;

    Ok(TaskOutcome {
        source,
        previous_version: current.version(),
        version: new_state.version(),
        state: new_state,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DiscoveryNode, DiscoveryNodes, IndexMetadata, Version};
    use crate::state::MemoryStateStore;

    fn pipeline() -> Arc<StateMutationPipeline> {
        let node = DiscoveryNode::new("n1", "127.0.0.1:9200", Version::CURRENT);
        let store = Arc::new(MemoryStateStore::new(ClusterState::initial(
            "test",
            DiscoveryNodes::single(node),
        )));
        StateMutationPipeline::start(store, StateVersionWatcher::new(), 16)
    }

    fn add_index(name: &'static str) -> impl FnOnce(&Arc<ClusterState>) -> MasterResult<Arc<ClusterState>> {
        move |state| {
            let index = IndexMetadata::builder(name).build()?;
            Ok(state
                .builder()
                .metadata(state.metadata().clone().with_index(index))
                .build())
        }
    }

    #[tokio::test]
    async fn test_commit_and_noop() {
        let pipeline = pipeline();

        let outcome = pipeline.submit("add [logs]", add_index("logs")).await.unwrap();
        assert!(outcome.changed());
        assert_eq!(outcome.version, 1);
        assert!(pipeline.state().metadata().has_index("logs"));

        let outcome = pipeline
            .submit("noop", |state| Ok(state.clone()))
            .await
            .unwrap();
        assert!(!outcome.changed());
        assert_eq!(pipeline.state().version(), 1);
    }

    #[tokio::test]
    async fn test_failed_task_leaves_state_unchanged() {
        let pipeline = pipeline();
        let err = pipeline
            .submit("fail", |_| Err(MasterError::illegal_argument("nope")))
            .await
            .unwrap_err();
        assert_eq!(err, MasterError::IllegalArgument("nope".to_string()));
        assert_eq!(pipeline.state().version(), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_stop_the_worker() {
        let pipeline = pipeline();

        let err = pipeline
            .submit("bad task", |_| -> MasterResult<Arc<ClusterState>> {
                panic!("bad task")
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MasterError::IllegalState("task [bad task] panicked: bad task".to_string())
        );
        assert_eq!(pipeline.state().version(), 0);

        let outcome = pipeline.submit("add [logs]", add_index("logs")).await.unwrap();
        assert!(outcome.changed());
        assert_eq!(outcome.version, 1);
        assert!(pipeline.state().metadata().has_index("logs"));
    }

    #[tokio::test]
    async fn test_stale_version_is_illegal_state() {
        let pipeline = pipeline();
        let err = pipeline
            .submit("stale", |state| Ok(state.builder().version(state.version()).build()))
            .await
            .unwrap_err();
        assert!(matches!(err, MasterError::IllegalState(_)));
        assert_eq!(pipeline.state().version(), 0);
    }

    #[tokio::test]
    async fn test_tasks_run_in_order_and_see_previous_result() {
        let pipeline = pipeline();
        let mut handles = Vec::new();
        for i in 0..10u64 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline
                    .submit(format!("task-{}", i), |state| Ok(state.builder().build()))
                    .await
            }));
        }
        let mut versions = Vec::new();
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.version, outcome.previous_version + 1);
            versions.push(outcome.version);
        }
        versions.sort_unstable();
        assert_eq!(versions, (1..=10).collect::<Vec<_>>());
        assert_eq!(pipeline.state().version(), 10);
    }

    #[tokio::test]
    async fn test_step_down_fails_tasks() {
        let pipeline = pipeline();
        pipeline.step_down();
        let err = pipeline.submit("late", add_index("logs")).await.unwrap_err();
        assert!(matches!(err, MasterError::NotMaster { .. }));
        assert!(err.is_retryable());
        assert_eq!(pipeline.state().version(), 0);
    }

    #[tokio::test]
    async fn test_losing_mastership_in_state_fails_next_task() {
        let pipeline = pipeline();
        pipeline
            .submit("elect n2", |state| {
                let nodes = state
                    .nodes()
                    .clone()
                    .with_node(DiscoveryNode::new("n2", "127.0.0.1:9201", Version::CURRENT))
                    .with_master(Some("n2".to_string()));
                Ok(state.builder().nodes(nodes).build())
            })
            .await
            .unwrap();

        let err = pipeline.submit("after", add_index("logs")).await.unwrap_err();
        assert_eq!(
            err,
            MasterError::NotMaster {
                local_node: "n1".to_string(),
                master_node: Some("n2".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_submit_with_timeout_acknowledges() {
        let pipeline = pipeline();
        let ack = pipeline
            .submit_with_timeout("add [logs]", add_index("logs"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(ack.acknowledged);
        assert_eq!(ack.outcome.unwrap().version, 1);

        let ack = pipeline
            .submit_with_timeout("instant timeout", |state| Ok(state.clone()), Duration::ZERO)
            .await
            .unwrap();
        // a zero timeout may race with the worker, either answer is valid
        assert_eq!(ack.acknowledged, ack.outcome.is_some());
    }
}
