//! Render request payload and output geometry.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use validator::Validate;

use crate::clip::ClipSpec;

/// Default output width in pixels.
pub const DEFAULT_WIDTH: u32 = 1920;
/// Default output height in pixels.
pub const DEFAULT_HEIGHT: u32 = 1080;
/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 30;

/// Target frame geometry of a rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for OutputGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }
}

/// A declarative edit: trim `clips` out of `source_url` and join them in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Remote source video
    #[validate(url(message = "sourceUrl must be a valid URL"))]
    pub source_url: String,

    /// Ordered trim ranges
    #[validate(length(min = 1, message = "clips must contain at least one clip"))]
    pub clips: Vec<ClipSpec>,

    /// Output width (default 1920)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 16, max = 7680))]
    pub width: Option<u32>,

    /// Output height (default 1080)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 16, max = 4320))]
    pub height: Option<u32>,

    /// Output frame rate (default 30)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 240))]
    pub fps: Option<u32>,
}

/// Request shape error, reported before a job is created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("{0}")]
    Invalid(String),

    #[error("Unsupported URL scheme '{0}'. Only http and https are allowed.")]
    UnsupportedScheme(String),

    #[error("{field} must be an even number (got {value})")]
    OddDimension { field: &'static str, value: u32 },
}

impl From<validator::ValidationErrors> for RequestError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Invalid(errors.to_string())
    }
}

impl RenderRequest {
    pub fn new(source_url: impl Into<String>, clips: Vec<ClipSpec>) -> Self {
        Self {
            source_url: source_url.into(),
            clips,
            width: None,
            height: None,
            fps: None,
        }
    }

    /// Output geometry with defaults filled in.
    pub fn geometry(&self) -> OutputGeometry {
        let defaults = OutputGeometry::default();
        OutputGeometry {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            fps: self.fps.unwrap_or(defaults.fps),
        }
    }

    /// Validate the request shape.
    ///
    /// Clip bounds are not checked here; they are checked when the filter
    /// graph is compiled and surface as a job failure.
    pub fn check(&self) -> Result<OutputGeometry, RequestError> {
        Validate::validate(self)?;

        let parsed = Url::parse(&self.source_url)
            .map_err(|e| RequestError::Invalid(format!("sourceUrl: {}", e)))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(RequestError::UnsupportedScheme(scheme.to_string())),
        }

        let geometry = self.geometry();
        // yuv420p output needs even dimensions
        if geometry.width % 2 != 0 {
            return Err(RequestError::OddDimension {
                field: "width",
                value: geometry.width,
            });
        }
        if geometry.height % 2 != 0 {
            return Err(RequestError::OddDimension {
                field: "height",
                value: geometry.height,
            });
        }

        Ok(geometry)
    }
}
