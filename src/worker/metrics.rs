//! Per-worker execution metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic execution counters for one worker. Reset only by process
/// restart.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerMetrics {
    /// Every finished execution, successful or not.
    pub total_tasks: u64,
    /// Executions that produced an output.
    pub successful_tasks: u64,
    /// Executions that failed after admission.
    pub failed_tasks: u64,
    /// Incremental weighted mean over successful executions.
    pub average_execution_time_ms: f64,
    /// When the worker last finished an execution.
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful execution and fold its duration into the
    /// running mean: `avg' = (avg * (n - 1) + sample) / n`.
    pub fn record_success(&mut self, execution_time_ms: u64) {
        self.total_tasks += 1;
        self.successful_tasks += 1;
        let n = self.successful_tasks as f64;
        self.average_execution_time_ms =
            (self.average_execution_time_ms * (n - 1.0) + execution_time_ms as f64) / n;
        self.last_executed_at = Some(Utc::now());
    }

    /// Record a failed execution.
    pub fn record_failure(&mut self) {
        self.total_tasks += 1;
        self.failed_tasks += 1;
        self.last_executed_at = Some(Utc::now());
    }

    /// Fraction of executions that succeeded, 0.0 before any finish.
    pub fn accuracy(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.successful_tasks as f64 / self.total_tasks as f64
        }
    }
}
