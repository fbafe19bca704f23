//! The pluggable analysis seam.
//!
//! A `Processor` is the domain body a worker wraps with validation,
//! admission control, deadline, and metrics. Implementations must
//! observe the cancellation token promptly: the worker cancels it when
//! the deadline expires and when it is stopped, and the contract is
//! that no background work survives that signal.

use crate::error::Result;
use crate::worker::WorkerInput;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// The payload a processing body produces. The wrapping worker stamps
/// the task id and measured execution time onto the final output.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Opaque result payload.
    pub result: Value,
    /// Reported confidence in [0, 1].
    pub confidence: f64,
    /// Opaque metadata propagated onto the output.
    pub metadata: HashMap<String, Value>,
}

impl Analysis {
    pub fn new(result: Value, confidence: f64) -> Self {
        Self {
            result,
            confidence,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Worker-specific processing logic.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Run the analysis. Must return promptly once `cancel` fires.
    async fn process(&self, input: &WorkerInput, cancel: CancellationToken) -> Result<Analysis>;

    /// The agent type this processor serves.
    fn agent_type(&self) -> &str;
}
