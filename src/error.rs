use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or driving an executor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("executor error: {0}")]
    Executor(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

/// Outcome of a task that did not complete.
///
/// Cloneable so that every holder of a shared future, and every aggregate
/// joined on it, can observe the same cause.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("task failed: {0:#}")]
    Failed(Arc<anyhow::Error>),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("operation was canceled")]
    Canceled,

    #[error("no input futures to race")]
    EmptyRace,

    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),
}

impl TaskError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Underlying error of a failed body, if the body returned one.
    pub fn source_error(&self) -> Option<&anyhow::Error> {
        match self {
            TaskError::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Failed(Arc::new(err))
    }
}
