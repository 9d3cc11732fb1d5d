use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to serialize/deserialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("browser pool failed to start: {0}")]
    BrowserLaunch(String),

    #[error("browser pool initialization timed out after {0:?}")]
    BrowserPoolTimeout(std::time::Duration),

    #[error("page operation failed: {0}")]
    PageOperation(String),

    #[error("a run is already in progress (started {elapsed_seconds}s ago)")]
    TaskAlreadyRunning { elapsed_seconds: u64 },

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("task persistence failed: {0}")]
    TaskPersistence(String),
}

pub type Result<T> = std::result::Result<T, Error>;
