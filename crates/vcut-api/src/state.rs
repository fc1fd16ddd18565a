//! Application state.

use crate::config::ApiConfig;
use crate::middleware::IngestRateLimiter;
use vcut_queue::JobQueue;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub queue: JobQueue,
    pub rate_limiter: IngestRateLimiter,
}

impl AppState {
    pub fn new(config: ApiConfig, queue: JobQueue) -> Self {
        let rate_limiter = IngestRateLimiter::new(config.rate_limit_rps, config.rate_limit_burst);
        Self {
            config,
            queue,
            rate_limiter,
        }
    }
}
