//! Workflow plans and the task-type catalog.

pub mod catalog;
pub mod plan;

pub use catalog::WorkflowCatalog;
pub use plan::{WorkflowPlan, WorkflowStep};
