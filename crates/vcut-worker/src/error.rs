//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Executor is already running")]
    AlreadyRunning,

    #[error("Cannot create working directory {}: {source}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Media(#[from] vcut_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] vcut_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Text recorded on a failed job.
    pub fn failure_message(&self) -> String {
        match self {
            WorkerError::Media(e) => e.detailed_message(),
            other => other.to_string(),
        }
    }
}
