//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use vcut_models::ClipBoundsError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching, compiling or rendering.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Fetch failed: {message}")]
    FetchFailed {
        message: String,
        status: Option<u16>,
    },

    #[error("Invalid clip: {0}")]
    InvalidClip(#[from] ClipBoundsError),

    #[error("No clips to render")]
    NoClips,

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a fetch failure error.
    pub fn fetch_failed(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::FetchFailed {
            message: message.into(),
            status,
        }
    }

    /// Message suitable for a job record: includes engine diagnostics when present.
    pub fn detailed_message(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}: {}", self, stderr.trim()),
            _ => self.to_string(),
        }
    }
}
