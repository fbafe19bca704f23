//! The workflow coordinator.
//!
//! Owns a fixed registry of named workers, a priority-ordered queue of
//! composite tasks, and a bounded set of in-flight tasks. A periodic
//! tick admits queued tasks while the active count is below the
//! configured ceiling — admission is by live count, so distinct
//! composite tasks genuinely overlap up to that ceiling.

pub mod executor;
pub mod synthesis;

pub use synthesis::{SynthesisEngine, SynthesisReport};

use crate::config::CoordinatorConfig;
use crate::core::queue::TaskQueue;
use crate::core::task::{CompositeTask, TaskId, TaskPriority};
use crate::error::Result;
use crate::worker::{Worker, WorkerStatusReport};
use crate::workflow::WorkflowCatalog;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Events emitted by the coordinator for composite task lifecycle
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// A task was accepted and queued.
    TaskQueued {
        /// The queued task.
        task_id: TaskId,
    },
    /// A task was dequeued and its workflow started.
    TaskStarted { task_id: TaskId },
    /// A task completed and carries a synthesized report.
    TaskCompleted { task_id: TaskId },
    /// A required step failed and the task was aborted.
    TaskFailed {
        task_id: TaskId,
        /// Error message describing the failure.
        error: String,
    },
}

/// Shared mutable state between the coordinator handle and its spawned
/// task futures.
struct Shared {
    queue: Mutex<TaskQueue>,
    active: RwLock<HashMap<TaskId, Arc<RwLock<CompositeTask>>>>,
    /// Terminal tasks, retained in memory so status stays inspectable.
    finished: RwLock<HashMap<TaskId, CompositeTask>>,
    event_tx: mpsc::Sender<CoordinatorEvent>,
}

/// The workflow engine.
///
/// # Example
///
/// ```ignore
/// use athanor::coordinator::{Coordinator, CoordinatorEvent};
///
/// let (tx, mut rx) = tokio::sync::mpsc::channel(100);
/// let coordinator = Arc::new(Coordinator::new(config, registry, catalog, tx)?);
/// let loop_handle = tokio::spawn({
///     let c = Arc::clone(&coordinator);
///     async move { c.run().await }
/// });
/// let task_id = coordinator.submit("research_synthesis", input, TaskPriority::High).await?;
/// ```
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: Arc<HashMap<String, Arc<Worker>>>,
    catalog: WorkflowCatalog,
    engine: Arc<SynthesisEngine>,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl Coordinator {
    /// Create a coordinator over a fixed worker registry and workflow
    /// catalog. Neither is mutable afterwards.
    pub fn new(
        config: CoordinatorConfig,
        registry: HashMap<String, Arc<Worker>>,
        catalog: WorkflowCatalog,
        event_tx: mpsc::Sender<CoordinatorEvent>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: Arc::new(registry),
            catalog,
            engine: Arc::new(SynthesisEngine::new()),
            shared: Arc::new(Shared {
                queue: Mutex::new(TaskQueue::new()),
                active: RwLock::new(HashMap::new()),
                finished: RwLock::new(HashMap::new()),
                event_tx,
            }),
            shutdown: CancellationToken::new(),
        })
    }

    /// Replace the synthesis engine, e.g. to register additional
    /// evidence extractors. Must happen before tasks run.
    pub fn set_synthesis_engine(&mut self, engine: SynthesisEngine) {
        self.engine = Arc::new(engine);
    }

    /// Validate, enqueue, and return the task id synchronously.
    /// Execution happens asynchronously on the scheduler loop.
    pub async fn submit(
        &self,
        task_type: &str,
        input: serde_json::Value,
        priority: TaskPriority,
    ) -> Result<TaskId> {
        let plan = self.catalog.resolve(task_type)?;
        let task = CompositeTask::new(task_type, input, priority, plan);
        let task_id = task.id;

        self.shared.queue.lock().await.push(task);
        tracing::info!(task_id = %task_id, task_type, %priority, "task queued");
        let _ = self
            .shared
            .event_tx
            .send(CoordinatorEvent::TaskQueued { task_id })
            .await;
        Ok(task_id)
    }

    /// Run the scheduler loop until shutdown.
    pub async fn run(&self) {
        let mut tick = tokio::time::interval(self.config.tick_interval());
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tick.tick() => {
                    self.dispatch_ready().await;
                }
            }
        }
    }

    /// Admit queued tasks while below the concurrency ceiling. Returns
    /// the number of tasks started this tick.
    pub async fn dispatch_ready(&self) -> usize {
        let mut dispatched = 0;
        loop {
            if self.shared.active.read().await.len() >= self.config.max_concurrent_tasks {
                break;
            }
            let Some(task) = self.shared.queue.lock().await.pop() else {
                break;
            };
            self.spawn_task(task).await;
            dispatched += 1;
        }
        dispatched
    }

    /// Move a dequeued task into the active set and spawn its workflow.
    async fn spawn_task(&self, task: CompositeTask) {
        let task_id = task.id;
        let task = Arc::new(RwLock::new(task));
        self.shared
            .active
            .write()
            .await
            .insert(task_id, Arc::clone(&task));

        let registry = Arc::clone(&self.registry);
        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            task.write().await.start();
            tracing::info!(task_id = %task_id, "workflow started");
            let _ = shared
                .event_tx
                .send(CoordinatorEvent::TaskStarted { task_id })
                .await;

            let outcome = executor::run_workflow(&registry, Arc::clone(&task)).await;

            let event = {
                let mut task = task.write().await;
                match outcome {
                    Ok(()) => {
                        let report = engine.synthesize(&task.workflow, &task.results);
                        task.complete(report);
                        tracing::info!(task_id = %task_id, "workflow completed");
                        CoordinatorEvent::TaskCompleted { task_id }
                    }
                    Err(e) => {
                        let error = e.to_string();
                        task.fail(&error);
                        tracing::warn!(task_id = %task_id, %error, "workflow failed");
                        CoordinatorEvent::TaskFailed { task_id, error }
                    }
                }
            };

            // Retire the task: out of the active set, into the finished
            // map, then tell observers.
            let snapshot = task.read().await.clone();
            shared.active.write().await.remove(&task_id);
            shared.finished.write().await.insert(task_id, snapshot);
            let _ = shared.event_tx.send(event).await;
        });
    }

    /// Snapshot of a task wherever it currently lives: queued, active,
    /// or finished.
    pub async fn task_status(&self, task_id: &TaskId) -> Option<CompositeTask> {
        if let Some(task) = self.shared.queue.lock().await.get(task_id) {
            return Some(task.clone());
        }
        if let Some(task) = self.shared.active.read().await.get(task_id) {
            return Some(task.read().await.clone());
        }
        self.shared.finished.read().await.get(task_id).cloned()
    }

    /// Snapshots of all in-flight tasks.
    pub async fn active_tasks(&self) -> Vec<CompositeTask> {
        let active = self.shared.active.read().await;
        let mut tasks = Vec::with_capacity(active.len());
        for task in active.values() {
            tasks.push(task.read().await.clone());
        }
        tasks
    }

    /// Number of tasks waiting in the queue.
    pub async fn queue_depth(&self) -> usize {
        self.shared.queue.lock().await.len()
    }

    /// Number of in-flight tasks.
    pub async fn active_count(&self) -> usize {
        self.shared.active.read().await.len()
    }

    /// Status and metrics for every registered worker.
    pub async fn worker_statuses(&self) -> HashMap<String, WorkerStatusReport> {
        let mut statuses = HashMap::new();
        for (name, worker) in self.registry.iter() {
            statuses.insert(name.clone(), worker.status_report().await);
        }
        statuses
    }

    /// Registered agent types, sorted.
    pub fn agent_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Task types the catalog can resolve.
    pub fn task_types(&self) -> Vec<&str> {
        self.catalog.task_types()
    }

    /// Stop the scheduler loop and every registered worker, giving each
    /// worker up to `deadline` to drain before force-cancel.
    pub async fn shutdown(&self, deadline: Duration) {
        tracing::info!("coordinator shutting down");
        self.shutdown.cancel();
        join_all(
            self.registry
                .values()
                .map(|worker| worker.stop(deadline)),
        )
        .await;
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("max_concurrent_tasks", &self.config.max_concurrent_tasks)
            .field("workers", &self.registry.len())
            .finish()
    }
}
