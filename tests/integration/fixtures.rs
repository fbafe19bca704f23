//! Shared harness and test processors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use athanor::config::{CoordinatorConfig, WorkerConfig};
use athanor::coordinator::{Coordinator, CoordinatorEvent};
use athanor::core::{CompositeTask, TaskId};
use athanor::error::Error;
use athanor::worker::{Analysis, Processor, Worker, WorkerEvent, WorkerInput};
use athanor::workers::{CompoundProcessor, CrossReferenceProcessor, LiteratureProcessor};
use athanor::workflow::catalog::{AGENT_COMPOUND, AGENT_CROSS_REFERENCE, AGENT_LITERATURE};
use athanor::workflow::WorkflowCatalog;

/// Execution span of one worker-level task, for overlap assertions.
pub type Span = (String, DateTime<Utc>, DateTime<Utc>);

/// Scripted processor: fixed latency, confidence, and failure mode,
/// recording execution spans.
pub struct ScriptedProcessor {
    pub agent_type: String,
    pub delay: Duration,
    pub confidence: f64,
    pub fail: bool,
    pub spans: Arc<StdMutex<Vec<Span>>>,
}

#[async_trait]
impl Processor for ScriptedProcessor {
    async fn process(
        &self,
        input: &WorkerInput,
        cancel: CancellationToken,
    ) -> athanor::Result<Analysis> {
        let started = Utc::now();
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        }
        self.spans
            .lock()
            .unwrap()
            .push((input.task_id.clone(), started, Utc::now()));
        if self.fail {
            Err(Error::Processing("scripted failure".to_string()))
        } else {
            Ok(Analysis::new(
                json!({"agent": self.agent_type}),
                self.confidence,
            ))
        }
    }

    fn agent_type(&self) -> &str {
        &self.agent_type
    }
}

/// Behavior of one scripted agent type in the harness registry.
#[derive(Clone)]
pub struct AgentSpec {
    pub agent_type: String,
    pub delay: Duration,
    pub confidence: f64,
    pub fail: bool,
    pub max_concurrent: usize,
    pub timeout_ms: u64,
}

impl AgentSpec {
    pub fn new(agent_type: &str) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            delay: Duration::from_millis(20),
            confidence: 0.8,
            fail: false,
            max_concurrent: 16,
            timeout_ms: 30_000,
        }
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

/// A coordinator wired to scripted workers and a caller-supplied
/// catalog.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub event_rx: mpsc::Receiver<CoordinatorEvent>,
    pub worker_event_rx: mpsc::Receiver<WorkerEvent>,
    pub spans: Arc<StdMutex<Vec<Span>>>,
}

impl Harness {
    pub fn new(
        coordinator_concurrency: usize,
        specs: &[AgentSpec],
        catalog: WorkflowCatalog,
    ) -> Self {
        let spans = Arc::new(StdMutex::new(Vec::new()));
        let (worker_tx, worker_event_rx) = mpsc::channel(1000);

        let mut registry = HashMap::new();
        for spec in specs {
            let processor = Arc::new(ScriptedProcessor {
                agent_type: spec.agent_type.clone(),
                delay: spec.delay,
                confidence: spec.confidence,
                fail: spec.fail,
                spans: Arc::clone(&spans),
            });
            registry.insert(
                spec.agent_type.clone(),
                Arc::new(Worker::new(
                    &spec.agent_type,
                    WorkerConfig {
                        max_concurrent_tasks: spec.max_concurrent,
                        timeout_ms: spec.timeout_ms,
                        ..Default::default()
                    },
                    processor,
                    worker_tx.clone(),
                )),
            );
        }

        let (event_tx, event_rx) = mpsc::channel(1000);
        let coordinator = Coordinator::new(
            CoordinatorConfig {
                max_concurrent_tasks: coordinator_concurrency,
                tick_interval_ms: 10,
                ..Default::default()
            },
            registry,
            catalog,
            event_tx,
        )
        .expect("valid harness config");

        Self {
            coordinator: Arc::new(coordinator),
            event_rx,
            worker_event_rx,
            spans,
        }
    }

    /// Poll until the task reaches a terminal state.
    pub async fn wait_finished(&self, task_id: &TaskId) -> CompositeTask {
        wait_finished(&self.coordinator, task_id).await
    }

    /// Span for the worker-level task id suffix `-{step_id}`.
    pub fn span_for(&self, step_id: &str) -> Span {
        let suffix = format!("-{}", step_id);
        self.spans
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _, _)| id.ends_with(&suffix))
            .cloned()
            .unwrap_or_else(|| panic!("no span recorded for step {}", step_id))
    }
}

/// Poll until the task reaches a terminal state, panicking after ~5s.
pub async fn wait_finished(coordinator: &Coordinator, task_id: &TaskId) -> CompositeTask {
    for _ in 0..1000 {
        if let Some(task) = coordinator.task_status(task_id).await {
            if task.is_finished() {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {} did not finish in time", task_id);
}

/// A coordinator wired to the real built-in domain workers and catalog.
pub struct BuiltinHarness {
    pub coordinator: Arc<Coordinator>,
    pub event_rx: mpsc::Receiver<CoordinatorEvent>,
    pub _worker_event_rx: mpsc::Receiver<WorkerEvent>,
}

impl BuiltinHarness {
    pub fn new() -> Self {
        let (worker_tx, worker_event_rx) = mpsc::channel(1000);

        let mut registry: HashMap<String, Arc<Worker>> = HashMap::new();
        registry.insert(
            AGENT_LITERATURE.to_string(),
            Arc::new(Worker::new(
                AGENT_LITERATURE,
                WorkerConfig::default(),
                Arc::new(LiteratureProcessor::new()),
                worker_tx.clone(),
            )),
        );
        registry.insert(
            AGENT_COMPOUND.to_string(),
            Arc::new(Worker::new(
                AGENT_COMPOUND,
                WorkerConfig::default(),
                Arc::new(CompoundProcessor::new()),
                worker_tx.clone(),
            )),
        );
        registry.insert(
            AGENT_CROSS_REFERENCE.to_string(),
            Arc::new(Worker::new(
                AGENT_CROSS_REFERENCE,
                WorkerConfig::default(),
                Arc::new(CrossReferenceProcessor::new()),
                worker_tx,
            )),
        );

        let (event_tx, event_rx) = mpsc::channel(1000);
        let coordinator = Coordinator::new(
            CoordinatorConfig {
                tick_interval_ms: 10,
                ..Default::default()
            },
            registry,
            WorkflowCatalog::builtin(),
            event_tx,
        )
        .expect("valid builtin config");

        Self {
            coordinator: Arc::new(coordinator),
            event_rx,
            _worker_event_rx: worker_event_rx,
        }
    }
}
