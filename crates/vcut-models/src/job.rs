//! Job records and phase updates.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::job_status::JobStatus;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracked state of one render request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current phase
    pub status: JobStatus,

    /// Advisory progress (0-100)
    pub progress: u8,

    /// Finished artifact, set once on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Failure description, set once on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Job-exclusive scratch directory
    pub work_dir: PathBuf,

    /// Number of clips in the request
    pub clip_count: usize,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in the `queued` phase.
    pub fn new(id: JobId, work_dir: impl Into<PathBuf>, clip_count: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            output_path: None,
            error: None,
            work_dir: work_dir.into(),
            clip_count,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge a patch into this record.
    ///
    /// The patch is checked as a whole before any field is written, so a
    /// rejected patch leaves the record untouched.
    pub fn apply(&mut self, patch: JobPatch) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                job_id: self.id.clone(),
                status: self.status,
            });
        }

        let target = patch.status.unwrap_or(self.status);
        if target != self.status && !self.status.can_transition_to(target) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        match target {
            JobStatus::Completed if patch.output_path.is_none() => {
                return Err(TransitionError::MissingOutputPath);
            }
            JobStatus::Failed if patch.error.is_none() => {
                return Err(TransitionError::MissingError);
            }
            _ => {}
        }
        if patch.output_path.is_some() && target != JobStatus::Completed {
            return Err(TransitionError::UnexpectedField {
                field: "output_path",
                status: target,
            });
        }
        if patch.error.is_some() && target != JobStatus::Failed {
            return Err(TransitionError::UnexpectedField {
                field: "error",
                status: target,
            });
        }

        if let Some(progress) = patch.progress {
            if target != JobStatus::Failed && progress < self.progress {
                return Err(TransitionError::ProgressRegression {
                    current: self.progress,
                    requested: progress,
                });
            }
        }

        self.status = target;
        if let Some(progress) = patch.progress {
            self.progress = progress.min(100);
        }
        if patch.output_path.is_some() {
            self.output_path = patch.output_path;
        }
        if patch.error.is_some() {
            self.error = patch.error;
        }
        self.updated_at = Utc::now();

        Ok(())
    }
}

/// Partial update of a job record. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl JobPatch {
    /// Move to `status` with its coarse progress marker.
    pub fn phase(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            progress: Some(status.progress()),
            ..Default::default()
        }
    }

    /// Update progress only.
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Mark job as completed with its artifact.
    pub fn completed(output_path: impl Into<PathBuf>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(JobStatus::Completed.progress()),
            output_path: Some(output_path.into()),
            error: None,
        }
    }

    /// Mark job as failed with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            progress: Some(JobStatus::Failed.progress()),
            output_path: None,
            error: Some(error.into()),
        }
    }
}

/// Rejected job update.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("job {job_id} is already {status}")]
    AlreadyTerminal { job_id: JobId, status: JobStatus },

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("completed jobs require an output path")]
    MissingOutputPath,

    #[error("failed jobs require an error message")]
    MissingError,

    #[error("{field} cannot be set while {status}")]
    UnexpectedField {
        field: &'static str,
        status: JobStatus,
    },

    #[error("progress cannot go backwards ({current} -> {requested})")]
    ProgressRegression { current: u8, requested: u8 },
}
