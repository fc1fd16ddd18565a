//! Trim clip definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum timestamp accepted for a clip bound (24 hours in seconds).
pub const MAX_CLIP_TIMESTAMP_SECS: f64 = 86400.0;

/// A single trim range of the source video, in seconds.
///
/// The position of a clip in the request defines where it lands in the
/// concatenated output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Start of the range (inclusive)
    pub start: f64,
    /// End of the range (exclusive)
    pub end: f64,
}

/// Clip bound validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClipBoundsError {
    #[error("clip {index}: start and end must be finite numbers")]
    NotFinite { index: usize },

    #[error("clip {index}: start must not be negative (got {start})")]
    NegativeStart { index: usize, start: f64 },

    #[error("clip {index}: end ({end}) must be greater than start ({start})")]
    EndNotAfterStart { index: usize, start: f64, end: f64 },

    #[error("clip {index}: bound exceeds maximum of {max} seconds")]
    ExceedsMaxTimestamp { index: usize, max: f64 },
}

impl ClipSpec {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Check the bounds of this clip.
    ///
    /// `index` is the clip's position in its request and is only used for
    /// the error message. Overlap with other clips is allowed.
    pub fn validate(&self, index: usize) -> Result<(), ClipBoundsError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(ClipBoundsError::NotFinite { index });
        }
        if self.start < 0.0 {
            return Err(ClipBoundsError::NegativeStart {
                index,
                start: self.start,
            });
        }
        if self.end <= self.start {
            return Err(ClipBoundsError::EndNotAfterStart {
                index,
                start: self.start,
                end: self.end,
            });
        }
        if self.end > MAX_CLIP_TIMESTAMP_SECS {
            return Err(ClipBoundsError::ExceedsMaxTimestamp {
                index,
                max: MAX_CLIP_TIMESTAMP_SECS,
            });
        }
        Ok(())
    }

    /// Duration of the clip in seconds.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}
