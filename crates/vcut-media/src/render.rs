//! Render engine invocation.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filter_graph::FilterGraph;

/// Output codec parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Streaming-optimized container layout
    pub faststart: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            faststart: true,
        }
    }
}

/// Something that executes a compiled filter program against a source file.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Render `source` through `graph` into `output`.
    async fn render(&self, source: &Path, graph: &FilterGraph, output: &Path) -> MediaResult<()>;
}

/// Render engine backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
    settings: RenderSettings,
}

impl FfmpegEngine {
    pub fn new(runner: FfmpegRunner, settings: RenderSettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Assemble the full, non-interactive engine invocation.
    pub fn build_command(&self, source: &Path, graph: &FilterGraph, output: &Path) -> FfmpegCommand {
        let s = &self.settings;
        let cmd = FfmpegCommand::new(source, output)
            .filter_complex(graph.to_filter_complex())
            .map(graph.video_output())
            .map(graph.audio_output())
            .video_codec(&s.video_codec)
            .preset(&s.preset)
            .crf(s.crf)
            .pixel_format(&s.pixel_format)
            .audio_codec(&s.audio_codec)
            .audio_bitrate(&s.audio_bitrate);

        if s.faststart {
            cmd.faststart()
        } else {
            cmd
        }
    }
}

#[async_trait]
impl RenderEngine for FfmpegEngine {
    async fn render(&self, source: &Path, graph: &FilterGraph, output: &Path) -> MediaResult<()> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }

        let cmd = self.build_command(source, graph, output);
        let start = Instant::now();
        let result = self.runner.run(&cmd).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = if result.is_ok() { "success" } else { "failure" };
        histogram!("vcut_render_duration_seconds", "outcome" => outcome).record(elapsed);

        result?;
        info!(
            output = %output.display(),
            duration_secs = elapsed,
            "Render finished"
        );
        Ok(())
    }
}
