use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Worker {worker} at capacity (max: {max})")]
    Capacity { worker: String, max: usize },

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task cancelled")]
    Cancelled,

    #[error("Step {step_id} has unmet dependencies: {missing:?}")]
    Dependency {
        step_id: String,
        missing: Vec<String>,
    },

    #[error("No worker registered for agent type: {0}")]
    WorkerNotFound(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl Error {
    /// Whether a failed execution may be retried by the explicit retry
    /// wrapper. Validation and capacity rejections describe the request
    /// itself; cancellation means the caller asked us to stop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Processing(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
