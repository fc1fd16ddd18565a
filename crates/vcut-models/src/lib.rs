//! Shared data models for the vcut render service.
//!
//! This crate provides Serde-serializable types for:
//! - Render requests and trim clips
//! - Output geometry
//! - Jobs, job status and the phase state machine

pub mod clip;
pub mod job;
pub mod job_status;
pub mod request;

// Re-export common types
pub use clip::{ClipBoundsError, ClipSpec};
pub use job::{Job, JobId, JobPatch, TransitionError};
pub use job_status::JobStatus;
pub use request::{OutputGeometry, RenderRequest, RequestError};
