//! The single-task execution contract.
//!
//! A `Worker` wraps a pluggable [`Processor`] with input validation,
//! admission control against a concurrency ceiling, a deadline that
//! actively cancels the losing side of the race, success/failure
//! metrics, and lifecycle events. Multiple workers (literature,
//! compound, cross-reference) share this contract and differ only in
//! their processing body.

pub mod metrics;
pub mod processor;

pub use metrics::WorkerMetrics;
pub use processor::{Analysis, Processor};

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Base backoff for the explicit retry wrapper; doubles per attempt.
const RETRY_BACKOFF_BASE_MS: u64 = 100;

/// Poll period while `stop` waits for the active set to drain.
const STOP_POLL_INTERVAL_MS: u64 = 10;

/// Input to a single task execution. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInput {
    /// Caller-unique id within this worker.
    pub task_id: String,
    /// Opaque payload. Must not be `Null`.
    pub data: serde_json::Value,
    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkerInput {
    pub fn new(task_id: &str, data: serde_json::Value) -> Self {
        Self {
            task_id: task_id.to_string(),
            data,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.task_id.is_empty() {
            return Err(Error::Validation("task_id must not be empty".to_string()));
        }
        if self.data.is_null() {
            return Err(Error::Validation("data must be present".to_string()));
        }
        Ok(())
    }
}

/// Output of a successful task execution. Produced exactly once per
/// successful `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub task_id: String,
    /// Opaque result payload.
    pub result: serde_json::Value,
    /// Confidence in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub execution_time_ms: u64,
}

/// Status of a task record inside the worker's active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    InProgress,
    Cancelled,
}

/// Internal bookkeeping for one in-flight execution. Removed from the
/// active set on completion or failure; the worker keeps no history.
#[derive(Debug)]
struct TaskRecord {
    status: RecordStatus,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

/// Introspection snapshot of an in-flight execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecordSnapshot {
    pub task_id: String,
    pub status: RecordStatus,
    pub started_at: DateTime<Utc>,
}

/// Worker status: Active while at least one task is in flight, and
/// forced Inactive by `stop`. There is no automatic error state — a
/// worker that fails tasks while processing others stays Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Inactive,
    Active,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Inactive => write!(f, "inactive"),
            WorkerStatus::Active => write!(f, "active"),
        }
    }
}

/// Status plus a metrics snapshot, as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusReport {
    pub status: WorkerStatus,
    pub active_tasks: usize,
    pub metrics: WorkerMetrics,
}

/// Events emitted by a worker for task lifecycle changes.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A task was admitted and started processing.
    TaskStarted {
        /// The worker that started it.
        worker: String,
        /// The task that started.
        task_id: String,
    },
    /// A task produced an output.
    TaskCompleted {
        worker: String,
        task_id: String,
        /// Measured wall-clock duration.
        execution_time_ms: u64,
    },
    /// A task failed (validation, capacity, deadline, cancellation, or
    /// processing error).
    TaskFailed {
        worker: String,
        task_id: String,
        /// Error message describing the failure.
        error: String,
    },
    /// The retry wrapper is re-invoking a task after a retryable failure.
    TaskRetried {
        worker: String,
        task_id: String,
        /// 1-based attempt number about to run.
        attempt: u32,
    },
}

/// A capacity-limited, deadline-enforcing task executor.
///
/// # Example
///
/// ```ignore
/// use tokio::sync::mpsc;
/// use athanor::config::WorkerConfig;
/// use athanor::worker::{Worker, WorkerInput};
/// use athanor::workers::LiteratureProcessor;
///
/// let (tx, mut rx) = mpsc::channel(100);
/// let worker = Worker::new("literature", WorkerConfig::default(),
///     std::sync::Arc::new(LiteratureProcessor::new()), tx);
/// let output = worker.execute(WorkerInput::new("t-1", serde_json::json!({"query": "BRCA1"}))).await?;
/// ```
pub struct Worker {
    name: String,
    config: WorkerConfig,
    processor: Arc<dyn Processor>,
    /// In-flight executions indexed by task id.
    active: RwLock<HashMap<String, TaskRecord>>,
    metrics: RwLock<WorkerMetrics>,
    /// Set by `stop`; forces the reported status to Inactive.
    stopped: AtomicBool,
    event_tx: mpsc::Sender<WorkerEvent>,
}

impl Worker {
    /// Create a worker. The configuration is immutable afterwards.
    pub fn new(
        name: &str,
        config: WorkerConfig,
        processor: Arc<dyn Processor>,
        event_tx: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        Self {
            name: name.to_string(),
            config,
            processor,
            active: RwLock::new(HashMap::new()),
            metrics: RwLock::new(WorkerMetrics::new()),
            stopped: AtomicBool::new(false),
            event_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Execute one task: validate, admit, run the body under the
    /// deadline, and settle metrics and events.
    ///
    /// The deadline and the processing body race; whichever resolves
    /// first wins, and the loser is actively cancelled through the
    /// task's cancellation token rather than abandoned.
    pub async fn execute(&self, input: WorkerInput) -> Result<WorkerOutput> {
        if let Err(e) = input.validate() {
            return self.reject(&input.task_id, e).await;
        }

        let cancel = CancellationToken::new();
        {
            let mut active = self.active.write().await;
            if active.len() >= self.config.max_concurrent_tasks {
                drop(active);
                let err = Error::Capacity {
                    worker: self.name.clone(),
                    max: self.config.max_concurrent_tasks,
                };
                return self.reject(&input.task_id, err).await;
            }
            if active.contains_key(&input.task_id) {
                drop(active);
                let err = Error::Validation(format!(
                    "task {} is already executing on worker {}",
                    input.task_id, self.name
                ));
                return self.reject(&input.task_id, err).await;
            }
            active.insert(
                input.task_id.clone(),
                TaskRecord {
                    status: RecordStatus::InProgress,
                    started_at: Utc::now(),
                    cancel: cancel.clone(),
                },
            );
        }

        if self.config.enable_logging {
            tracing::debug!(worker = %self.name, task_id = %input.task_id, "task started");
        }
        let _ = self
            .event_tx
            .send(WorkerEvent::TaskStarted {
                worker: self.name.clone(),
                task_id: input.task_id.clone(),
            })
            .await;

        let started = tokio::time::Instant::now();
        let result = tokio::select! {
            res = self.processor.process(&input, cancel.clone()) => res,
            _ = tokio::time::sleep(self.config.timeout()) => {
                // Cancel the losing body so no background work leaks.
                cancel.cancel();
                Err(Error::Timeout(self.config.timeout()))
            }
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };
        let execution_time_ms = started.elapsed().as_millis() as u64;

        self.active.write().await.remove(&input.task_id);

        match result {
            Ok(analysis) => {
                self.metrics.write().await.record_success(execution_time_ms);
                if self.config.enable_logging {
                    tracing::debug!(
                        worker = %self.name,
                        task_id = %input.task_id,
                        execution_time_ms,
                        "task completed"
                    );
                }
                let _ = self
                    .event_tx
                    .send(WorkerEvent::TaskCompleted {
                        worker: self.name.clone(),
                        task_id: input.task_id.clone(),
                        execution_time_ms,
                    })
                    .await;
                Ok(WorkerOutput {
                    task_id: input.task_id,
                    result: analysis.result,
                    confidence: analysis.confidence.clamp(0.0, 1.0),
                    metadata: analysis.metadata,
                    execution_time_ms,
                })
            }
            Err(e) => {
                self.metrics.write().await.record_failure();
                if self.config.enable_logging {
                    tracing::warn!(
                        worker = %self.name,
                        task_id = %input.task_id,
                        error = %e,
                        "task failed"
                    );
                }
                let _ = self
                    .event_tx
                    .send(WorkerEvent::TaskFailed {
                        worker: self.name.clone(),
                        task_id: input.task_id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Execute with bounded, observable retry.
    ///
    /// Re-invokes `execute` after retryable failures (timeouts and
    /// processing errors) up to `retry_attempts` times with exponential
    /// backoff, emitting a `TaskRetried` event per re-invocation.
    /// Validation, capacity, and cancellation failures are final.
    pub async fn execute_with_retry(&self, input: WorkerInput) -> Result<WorkerOutput> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute(input.clone()).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        worker = %self.name,
                        task_id = %input.task_id,
                        attempt,
                        error = %e,
                        "retrying task"
                    );
                    let _ = self
                        .event_tx
                        .send(WorkerEvent::TaskRetried {
                            worker: self.name.clone(),
                            task_id: input.task_id.clone(),
                            attempt,
                        })
                        .await;
                    let backoff = RETRY_BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancel one in-flight task through its cancellation token.
    ///
    /// Returns true if the task was found. The racing `execute` call
    /// observes the token, fails with `Cancelled`, and cleans up its own
    /// record.
    pub async fn cancel_task(&self, task_id: &str) -> bool {
        let mut active = self.active.write().await;
        match active.get_mut(task_id) {
            Some(record) => {
                record.status = RecordStatus::Cancelled;
                record.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop the worker: report Inactive immediately, wait up to
    /// `deadline` for in-flight tasks to drain, then force-cancel the
    /// survivors through the same tokens the timeout race uses.
    ///
    /// Returns the number of tasks that had to be force-cancelled.
    pub async fn stop(&self, deadline: Duration) -> usize {
        self.stopped.store(true, Ordering::SeqCst);

        let start = tokio::time::Instant::now();
        while start.elapsed() < deadline {
            if self.active.read().await.is_empty() {
                return 0;
            }
            tokio::time::sleep(Duration::from_millis(STOP_POLL_INTERVAL_MS)).await;
        }

        let mut active = self.active.write().await;
        let survivors = active.len();
        for (task_id, record) in active.iter_mut() {
            tracing::warn!(worker = %self.name, task_id = %task_id, "force-cancelling task at stop deadline");
            record.status = RecordStatus::Cancelled;
            record.cancel.cancel();
        }
        survivors
    }

    /// Current status: Inactive when stopped or idle, Active while at
    /// least one task is in flight.
    pub async fn status(&self) -> WorkerStatus {
        if self.stopped.load(Ordering::SeqCst) {
            return WorkerStatus::Inactive;
        }
        if self.active.read().await.is_empty() {
            WorkerStatus::Inactive
        } else {
            WorkerStatus::Active
        }
    }

    /// Number of in-flight executions.
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Snapshots of the in-flight executions.
    pub async fn active_records(&self) -> Vec<TaskRecordSnapshot> {
        self.active
            .read()
            .await
            .iter()
            .map(|(task_id, record)| TaskRecordSnapshot {
                task_id: task_id.clone(),
                status: record.status,
                started_at: record.started_at,
            })
            .collect()
    }

    /// A copy of the current metrics.
    pub async fn metrics(&self) -> WorkerMetrics {
        self.metrics.read().await.clone()
    }

    /// Status plus metrics, for health aggregation by callers.
    pub async fn status_report(&self) -> WorkerStatusReport {
        WorkerStatusReport {
            status: self.status().await,
            active_tasks: self.active_count().await,
            metrics: self.metrics().await,
        }
    }

    /// Settle a rejection that happened before a record existed.
    async fn reject(&self, task_id: &str, err: Error) -> Result<WorkerOutput> {
        self.metrics.write().await.record_failure();
        if self.config.enable_logging {
            tracing::warn!(worker = %self.name, task_id, error = %err, "task rejected");
        }
        let _ = self
            .event_tx
            .send(WorkerEvent::TaskFailed {
                worker: self.name.clone(),
                task_id: task_id.to_string(),
                error: err.to_string(),
            })
            .await;
        Err(err)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("max_concurrent_tasks", &self.config.max_concurrent_tasks)
            .finish()
    }
}
