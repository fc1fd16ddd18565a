//! Media side of the render pipeline.
//!
//! This crate provides:
//! - A pure filter graph compiler (trim, concat, scale/pad, fps)
//! - Streaming HTTP fetch of source assets
//! - Type-safe FFmpeg command building
//! - FFmpeg invocation with bounded diagnostic capture

pub mod command;
pub mod error;
pub mod fetch;
pub mod filter_graph;
pub mod render;

pub use command::{
    check_ffmpeg, FfmpegCommand, FfmpegRunner, DEFAULT_MAX_STDERR_BYTES, MIN_STDERR_BYTES,
};
pub use error::{MediaError, MediaResult};
pub use fetch::{FetchConfig, HttpFetcher, MediaFetcher};
pub use filter_graph::{compile, FilterGraph, AUDIO_OUTPUT, VIDEO_OUTPUT};
pub use render::{FfmpegEngine, RenderEngine, RenderSettings};
