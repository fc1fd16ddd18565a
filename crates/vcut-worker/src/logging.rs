//! Structured job logging.
//!
//! Every line carries the job ID and the phase it was emitted from, so a
//! single job can be followed through the logs with one filter.

use tracing::{error, info, warn, Span};

use vcut_models::{JobId, JobStatus};

/// Job logger with consistent structured fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    clip_count: usize,
}

impl JobLogger {
    pub fn new(job_id: &JobId, clip_count: usize) -> Self {
        Self {
            job_id: job_id.to_string(),
            clip_count,
        }
    }

    /// Log the start of a job.
    pub fn log_start(&self, source_url: &str, output_secs: f64) {
        info!(
            job_id = %self.job_id,
            clips = self.clip_count,
            output_secs = output_secs,
            source_url = %source_url,
            "Job started"
        );
    }

    /// Log entry into a phase.
    pub fn log_phase(&self, status: JobStatus) {
        info!(
            job_id = %self.job_id,
            phase = %status,
            progress = status.progress(),
            "Job phase"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "Job warning: {}", message);
    }

    /// Log a job failure.
    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, "Job failed: {}", message);
    }

    /// Log the completion of a job.
    pub fn log_completion(&self, output: &str, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            output = %output,
            elapsed_secs,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span wrapping all work for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, clips = self.clip_count)
    }
}
