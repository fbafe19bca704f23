pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod worker;
pub mod workers;
pub mod workflow;

pub use config::{Config, CoordinatorConfig, WorkerConfig};
pub use coordinator::{Coordinator, CoordinatorEvent, SynthesisReport};
pub use self::core::{CompositeTask, TaskId, TaskPriority, TaskStatus};
pub use error::{Error, Result};
pub use worker::{Worker, WorkerInput, WorkerOutput, WorkerStatus};
pub use workflow::{WorkflowCatalog, WorkflowPlan, WorkflowStep};
