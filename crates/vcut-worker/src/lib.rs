//! Render worker.
//!
//! This crate provides:
//! - The job executor draining the render queue
//! - The per-job render pipeline (fetch, compile, render)
//! - Worker configuration, logging and metrics helpers

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::{RenderPipeline, OUTPUT_FILE_NAME, SOURCE_FILE_NAME};
