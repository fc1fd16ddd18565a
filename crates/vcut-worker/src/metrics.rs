//! Worker metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "vcut_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vcut_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vcut_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "vcut_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "vcut_job_duration_seconds";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
    gauge!(names::JOBS_IN_FLIGHT).increment(1.0);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "completed").record(duration_secs);
}

/// Record a failed job. `reason` is `error` or `panic`.
pub fn record_job_failed(reason: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "reason" => reason).increment(1);
    gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "failed").record(duration_secs);
}
