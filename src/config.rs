//! Runtime configuration.
//!
//! Configuration is an explicit object handed to constructors rather than
//! a process-global: tests and embedders can run several independently
//! configured coordinators in one process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

fn default_worker_concurrency() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_enable_logging() -> bool {
    true
}

fn default_coordinator_concurrency() -> usize {
    3
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    100
}

/// Per-worker execution settings, immutable once the worker is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Admission ceiling: executions beyond this are rejected, not queued.
    #[serde(default = "default_worker_concurrency")]
    pub max_concurrent_tasks: usize,
    /// Deadline for a single processing body.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Gates per-task lifecycle logging.
    #[serde(default = "default_enable_logging")]
    pub enable_logging: bool,
    /// Bound for the explicit retry wrapper. `execute` itself never
    /// retries regardless of this value.
    #[serde(default)]
    pub retry_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_worker_concurrency(),
            timeout_ms: default_timeout_ms(),
            enable_logging: default_enable_logging(),
            retry_attempts: 0,
        }
    }
}

impl WorkerConfig {
    /// The processing deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject configurations that cannot admit any work.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(Error::Validation(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Validation(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Coordinator scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How many composite tasks may run concurrently.
    #[serde(default = "default_coordinator_concurrency")]
    pub max_concurrent_tasks: usize,
    /// Scheduler tick period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Bounded capacity of the lifecycle event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_coordinator_concurrency(),
            tick_interval_ms: default_tick_interval_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl CoordinatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(Error::Validation(
                "coordinator max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::Validation(
                "tick_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration: one coordinator section plus a table of named
/// worker sections.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub workers: HashMap<String, WorkerConfig>,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Settings for a named worker, or the defaults when the file has no
    /// section for it.
    pub fn worker(&self, name: &str) -> WorkerConfig {
        self.workers.get(name).cloned().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        self.coordinator.validate()?;
        for (name, worker) in &self.workers {
            worker
                .validate()
                .map_err(|e| Error::Validation(format!("worker {}: {}", name, e)))?;
        }
        Ok(())
    }
}
