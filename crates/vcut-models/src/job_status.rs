//! Render job phases.

use serde::{Deserialize, Serialize};

/// Phase of a render job.
///
/// Phases advance strictly in declaration order; `Failed` is reachable from
/// any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for the worker
    #[default]
    Queued,
    /// Source asset fetch in progress
    Downloading,
    /// Filter graph compiled, engine about to start
    Preparing,
    /// Render engine running
    Rendering,
    /// Output artifact is ready
    Completed,
    /// Job failed with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Preparing => "preparing",
            JobStatus::Rendering => "rendering",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Coarse progress percentage reported while in this phase.
    pub fn progress(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Downloading => 5,
            JobStatus::Preparing => 12,
            JobStatus::Rendering => 20,
            JobStatus::Completed => 100,
            JobStatus::Failed => 0,
        }
    }

    /// The phase that follows this one on the success path.
    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Queued => Some(JobStatus::Downloading),
            JobStatus::Downloading => Some(JobStatus::Preparing),
            JobStatus::Preparing => Some(JobStatus::Rendering),
            JobStatus::Rendering => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == JobStatus::Failed || self.next() == Some(to)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
