//! Task-type to workflow-plan catalog.
//!
//! The catalog is handed to the coordinator at construction. Unknown
//! task types are rejected at submission instead of dissolving into an
//! empty workflow that "completes" with nothing to show.

use crate::error::{Error, Result};
use crate::workflow::plan::{WorkflowPlan, WorkflowStep};
use serde_json::json;
use std::collections::HashMap;

/// Agent type handled by the literature worker.
pub const AGENT_LITERATURE: &str = "literature";
/// Agent type handled by the compound worker.
pub const AGENT_COMPOUND: &str = "compound";
/// Agent type handled by the cross-reference worker.
pub const AGENT_CROSS_REFERENCE: &str = "cross_reference";

/// Maps task types to their declared workflow templates.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    plans: HashMap<String, WorkflowPlan>,
}

impl WorkflowCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plan for a task type, replacing any previous plan.
    pub fn register(&mut self, task_type: &str, plan: WorkflowPlan) {
        self.plans.insert(task_type.to_string(), plan);
    }

    /// The plan for a task type.
    pub fn resolve(&self, task_type: &str) -> Result<WorkflowPlan> {
        self.plans
            .get(task_type)
            .cloned()
            .ok_or_else(|| Error::UnknownTaskType(task_type.to_string()))
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.plans.contains_key(task_type)
    }

    /// Registered task types, sorted for stable output.
    pub fn task_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.plans.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// The built-in research workflows.
    ///
    /// `research_synthesis` fans literature and compound analysis out in
    /// parallel, then cross-references both; `compound_screening` profiles
    /// a compound and optionally pulls literature context;
    /// `literature_review` is a single search step.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();

        catalog.register(
            "research_synthesis",
            WorkflowPlan::new(vec![
                WorkflowStep::new("literature-search", AGENT_LITERATURE)
                    .with_input(json!({"max_results": 20}))
                    .parallel(),
                WorkflowStep::new("compound-analysis", AGENT_COMPOUND).parallel(),
                WorkflowStep::new("cross-reference", AGENT_CROSS_REFERENCE)
                    .with_dependencies(["literature-search", "compound-analysis"]),
            ])
            .expect("builtin research_synthesis plan is valid"),
        );

        catalog.register(
            "compound_screening",
            WorkflowPlan::new(vec![
                WorkflowStep::new("compound-profile", AGENT_COMPOUND),
                WorkflowStep::new("literature-context", AGENT_LITERATURE)
                    .with_input(json!({"max_results": 5}))
                    .with_dependencies(["compound-profile"])
                    .optional(),
            ])
            .expect("builtin compound_screening plan is valid"),
        );

        catalog.register(
            "literature_review",
            WorkflowPlan::new(vec![WorkflowStep::new(
                "literature-search",
                AGENT_LITERATURE,
            )])
            .expect("builtin literature_review plan is valid"),
        );

        catalog
    }
}
