//! Job intake for the render worker.
//!
//! This crate provides:
//! - The job store abstraction and its in-memory implementation
//! - A bounded FIFO queue feeding the worker
//! - Status and artifact lookups for the HTTP surface

pub mod error;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, JobReceiver, QueueConfig, QueuedJob};
pub use store::{InMemoryJobStore, JobStore};
