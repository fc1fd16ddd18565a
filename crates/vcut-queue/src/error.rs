//! Queue error types.

use thiserror::Error;

use vcut_models::{JobId, JobStatus, RequestError, TransitionError};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid request: {0}")]
    Validation(#[from] RequestError),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {job_id} is not ready (status: {status})")]
    NotReady { job_id: JobId, status: JobStatus },

    #[error("Job already exists: {0}")]
    Duplicate(JobId),

    #[error("Queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },

    #[error("Queue is closed")]
    Closed,

    #[error("Rejected job update: {0}")]
    Transition(#[from] TransitionError),
}

impl QueueError {
    pub fn not_found(job_id: &JobId) -> Self {
        Self::NotFound(job_id.clone())
    }

    /// Check if the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QueueError::Validation(_) | QueueError::NotFound(_) | QueueError::NotReady { .. }
        )
    }
}
