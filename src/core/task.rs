//! Composite task data model.
//!
//! A composite task is a user-submitted unit of work decomposed into a
//! declared workflow of steps across one or more workers. It tracks its
//! priority, lifecycle status, per-step results, and the synthesized
//! final report.

use crate::coordinator::synthesis::SynthesisReport;
use crate::worker::WorkerOutput;
use crate::workflow::WorkflowPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a composite task.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Scheduling priority for a composite task.
///
/// The queue orders descending, so `Urgent` tasks dequeue before `High`,
/// and so on. Within a tier, submission order is preserved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Composite task status in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Queued, waiting for a scheduler slot.
    #[default]
    Pending,
    /// The workflow is executing.
    InProgress,
    /// All required steps finished and a report was synthesized.
    Completed,
    /// A required step failed.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
    /// Cancelled before completion.
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed { error } => write!(f, "failed: {}", error),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A user-submitted composite task and everything collected while
/// executing it.
///
/// Invariant: every key in `results` is the `step_id` of a step in
/// `workflow`. The reverse does not hold — skipped optional steps and
/// failed optional steps contribute no entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeTask {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// The task type that selected the workflow.
    pub task_type: String,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Caller-supplied input, available to steps that declare none.
    pub input: serde_json::Value,
    /// The declared execution plan. Never mutated after submission.
    pub workflow: WorkflowPlan,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Outputs of successfully executed steps, keyed by step id.
    pub results: HashMap<String, WorkerOutput>,
    /// The synthesized report, present once the task completes.
    pub final_result: Option<SynthesisReport>,
    /// When the task was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the workflow started executing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message, present when the task failed.
    pub error: Option<String>,
}

impl CompositeTask {
    /// Create a pending task for the given type, input, and priority.
    pub fn new(
        task_type: &str,
        input: serde_json::Value,
        priority: TaskPriority,
        workflow: WorkflowPlan,
    ) -> Self {
        Self {
            id: TaskId::new(),
            task_type: task_type.to_string(),
            priority,
            input,
            workflow,
            status: TaskStatus::Pending,
            results: HashMap::new(),
            final_result: None,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Transition to InProgress and record the start time.
    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Attach the synthesized report and mark the task completed.
    pub fn complete(&mut self, report: SynthesisReport) {
        self.final_result = Some(report);
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task failed. Partial `results` are retained for
    /// diagnostics; no report is synthesized.
    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Failed {
            error: error.to_string(),
        };
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task cancelled.
    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Whether the task reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed { .. } | TaskStatus::Cancelled
        )
    }
}
