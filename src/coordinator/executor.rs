//! Workflow execution: the declared-order step walk.
//!
//! Steps run in declaration order. Contiguous steps marked parallel are
//! spawned into a batch and jointly awaited; a non-parallel step drains
//! the batch before it runs. Dependency checks happen against the
//! resolved set — one consistent rule covers both skip paths: a skipped
//! or failed optional step is resolved but never contributes a result.

use crate::core::task::CompositeTask;
use crate::error::{Error, Result};
use crate::worker::{Worker, WorkerInput, WorkerOutput};
use crate::workflow::WorkflowStep;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// One spawned parallel step awaiting its drain.
struct InFlightStep {
    step_id: String,
    optional: bool,
    worker: Arc<Worker>,
    worker_task_id: String,
    handle: JoinHandle<Result<WorkerOutput>>,
}

/// Walk a composite task's workflow against the worker registry,
/// filling `results` in place.
///
/// Returns `Err` when a required step cannot run or fails; partial
/// results written before the abort stay on the task for diagnostics.
pub async fn run_workflow(
    registry: &HashMap<String, Arc<Worker>>,
    task: Arc<RwLock<CompositeTask>>,
) -> Result<()> {
    let (task_id, task_input, plan) = {
        let task = task.read().await;
        (task.id, task.input.clone(), task.workflow.clone())
    };

    let mut resolved: HashSet<String> = HashSet::new();
    let mut batch: Vec<InFlightStep> = Vec::new();

    for step in plan.steps() {
        // A dependency sitting in the un-drained batch must settle
        // before this step's dependency check can be meaningful.
        let depends_on_batch = step
            .dependencies
            .iter()
            .any(|dep| batch.iter().any(|in_flight| in_flight.step_id == *dep));
        if depends_on_batch || (!step.parallel && !batch.is_empty()) {
            drain_batch(&mut batch, &task, &mut resolved).await?;
        }

        let mut missing: Vec<String> = step
            .dependencies
            .iter()
            .filter(|dep| !resolved.contains(*dep))
            .cloned()
            .collect();
        missing.sort_unstable();

        if !missing.is_empty() {
            if step.optional {
                tracing::debug!(
                    task_id = %task_id,
                    step_id = %step.step_id,
                    ?missing,
                    "skipping optional step with unmet dependencies"
                );
                resolved.insert(step.step_id.clone());
                continue;
            }
            abort_batch(&mut batch).await;
            return Err(Error::Dependency {
                step_id: step.step_id.clone(),
                missing,
            });
        }

        let worker = match registry.get(&step.agent_type) {
            Some(worker) => Arc::clone(worker),
            None if step.optional => {
                tracing::warn!(
                    task_id = %task_id,
                    step_id = %step.step_id,
                    agent_type = %step.agent_type,
                    "skipping optional step with no registered worker"
                );
                resolved.insert(step.step_id.clone());
                continue;
            }
            None => {
                abort_batch(&mut batch).await;
                return Err(Error::WorkerNotFound(step.agent_type.clone()));
            }
        };

        let input = step_input(&task_id.to_string(), &task_input, step);

        if step.parallel {
            let worker_task_id = input.task_id.clone();
            let spawned_worker = Arc::clone(&worker);
            let handle = tokio::spawn(async move { spawned_worker.execute(input).await });
            batch.push(InFlightStep {
                step_id: step.step_id.clone(),
                optional: step.optional,
                worker,
                worker_task_id,
                handle,
            });
        } else {
            match worker.execute(input).await {
                Ok(output) => {
                    task.write().await.results.insert(step.step_id.clone(), output);
                }
                Err(e) if step.optional => {
                    tracing::warn!(
                        task_id = %task_id,
                        step_id = %step.step_id,
                        error = %e,
                        "optional step failed"
                    );
                }
                Err(e) => {
                    return Err(Error::Processing(format!(
                        "step {} failed: {}",
                        step.step_id, e
                    )));
                }
            }
            resolved.insert(step.step_id.clone());
        }
    }

    drain_batch(&mut batch, &task, &mut resolved).await?;
    Ok(())
}

/// Await every spawned step in the batch, recording successes and
/// tolerating optional failures. A required failure cancels the rest of
/// the batch and aborts.
async fn drain_batch(
    batch: &mut Vec<InFlightStep>,
    task: &Arc<RwLock<CompositeTask>>,
    resolved: &mut HashSet<String>,
) -> Result<()> {
    let mut in_flight: Vec<InFlightStep> = batch.drain(..).collect();

    while !in_flight.is_empty() {
        let entry = in_flight.remove(0);
        let outcome = entry
            .handle
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))?;

        match outcome {
            Ok(output) => {
                task.write().await.results.insert(entry.step_id.clone(), output);
                resolved.insert(entry.step_id);
            }
            Err(e) if entry.optional => {
                tracing::warn!(step_id = %entry.step_id, error = %e, "optional step failed");
                resolved.insert(entry.step_id);
            }
            Err(e) => {
                // Cancel the rest of the batch through the same signal
                // the timeout race uses, then settle it.
                for remaining in &in_flight {
                    remaining.worker.cancel_task(&remaining.worker_task_id).await;
                }
                for remaining in in_flight {
                    let _ = remaining.handle.await;
                }
                return Err(Error::Processing(format!(
                    "step {} failed: {}",
                    entry.step_id, e
                )));
            }
        }
    }
    Ok(())
}

/// Cancel and settle every entry of an in-flight batch.
async fn abort_batch(batch: &mut Vec<InFlightStep>) {
    for entry in batch.iter() {
        entry.worker.cancel_task(&entry.worker_task_id).await;
    }
    for entry in batch.drain(..) {
        let _ = entry.handle.await;
    }
}

/// Build the worker input for one step.
///
/// The worker-facing task id is `{composite_id}-{step_id}`; a step with
/// no declared input receives the composite task's input.
fn step_input(
    composite_id: &str,
    task_input: &serde_json::Value,
    step: &WorkflowStep,
) -> WorkerInput {
    let data = if step.input.is_null() {
        task_input.clone()
    } else {
        step.input.clone()
    };
    WorkerInput::new(&format!("{}-{}", composite_id, step.step_id), data)
        .with_metadata("composite_task_id", json!(composite_id))
        .with_metadata("step_id", json!(step.step_id))
}
