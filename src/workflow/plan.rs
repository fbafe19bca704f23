//! Workflow step and plan definitions.
//!
//! A plan is an ordered list of steps with dependency sets. Order is
//! meaningful: the executor walks steps in declared order, batching
//! contiguous parallel steps. Plans are validated once at construction
//! so nothing malformed ever reaches the queue.

use crate::error::{Error, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One node in a composite task's static execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique within the plan.
    pub step_id: String,
    /// Names a registered worker.
    pub agent_type: String,
    /// Step-specific input. `Null` means the composite task's input is
    /// passed through instead.
    #[serde(default)]
    pub input: serde_json::Value,
    /// Step ids that must be resolved before this step runs.
    #[serde(default)]
    pub dependencies: HashSet<String>,
    /// Batch with adjacent parallel steps instead of awaiting inline.
    #[serde(default)]
    pub parallel: bool,
    /// A failure or unmet dependency skips the step instead of aborting
    /// the task.
    #[serde(default)]
    pub optional: bool,
}

impl WorkflowStep {
    /// Create a sequential, required step with no input or dependencies.
    pub fn new(step_id: &str, agent_type: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            agent_type: agent_type.to_string(),
            input: serde_json::Value::Null,
            dependencies: HashSet::new(),
            parallel: false,
            optional: false,
        }
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A validated, ordered execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowPlan {
    steps: Vec<WorkflowStep>,
}

impl WorkflowPlan {
    /// Build a plan, rejecting duplicate step ids and dependency cycles.
    ///
    /// Dependencies on step ids not declared in the plan are permitted:
    /// they can never be satisfied, so at runtime a required step aborts
    /// the task and an optional step is skipped. They are worth a
    /// warning, since templates usually mean every dependency to exist.
    pub fn new(steps: Vec<WorkflowStep>) -> Result<Self> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for step in &steps {
            if indices.contains_key(step.step_id.as_str()) {
                return Err(Error::InvalidWorkflow(format!(
                    "duplicate step id: {}",
                    step.step_id
                )));
            }
            let index = graph.add_node(step.step_id.as_str());
            indices.insert(step.step_id.as_str(), index);
        }

        for step in &steps {
            for dep in &step.dependencies {
                match indices.get(dep.as_str()) {
                    Some(&dep_index) => {
                        graph.add_edge(dep_index, indices[step.step_id.as_str()], ());
                    }
                    None => {
                        tracing::warn!(
                            step_id = %step.step_id,
                            dependency = %dep,
                            "workflow step depends on an undeclared step"
                        );
                    }
                }
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(Error::InvalidWorkflow(
                "dependency cycle detected".to_string(),
            ));
        }

        Ok(Self { steps })
    }

    /// Steps in declared order.
    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    /// Look up a step by id.
    pub fn get(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// The declared agent type of a step, if the step exists.
    pub fn agent_type(&self, step_id: &str) -> Option<&str> {
        self.get(step_id).map(|s| s.agent_type.as_str())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
