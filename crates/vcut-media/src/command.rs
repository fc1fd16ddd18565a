//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Default cap on captured engine diagnostics (64 KiB).
pub const DEFAULT_MAX_STDERR_BYTES: usize = 64 * 1024;

/// Smallest diagnostic capture a runner accepts (4 KiB).
pub const MIN_STDERR_BYTES: usize = 4 * 1024;

/// Engine log level; only errors reach stderr.
const LOG_LEVEL: &str = "error";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter graph label into the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Move the moov atom to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Set whether an existing output file is overwritten.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.output_args.len() + 8);

        // Never prompt
        args.push(if self.overwrite { "-y" } else { "-n" }.to_string());
        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(LOG_LEVEL.to_string());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with bounded diagnostic capture.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Engine executable (looked up on PATH)
    binary: PathBuf,
    /// Maximum bytes of stderr kept for error reports
    max_stderr_bytes: usize,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner for the `ffmpeg` on PATH.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
        }
    }

    /// Use a different engine executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the diagnostic capture limit, never below [`MIN_STDERR_BYTES`].
    pub fn with_max_stderr_bytes(mut self, max: usize) -> Self {
        self.max_stderr_bytes = max.max(MIN_STDERR_BYTES);
        self
    }

    /// Run an FFmpeg command to completion.
    ///
    /// Fails with the captured tail of stderr when the engine exits non-zero.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let program = which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let max = self.max_stderr_bytes;
        let capture = tokio::spawn(async move { capture_tail(stderr, max).await });

        let status = child.wait().await?;
        let diagnostics = match capture.await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Failed to read FFmpeg stderr: {}", e);
                String::new()
            }
            Err(e) => {
                warn!("FFmpeg stderr reader panicked: {}", e);
                String::new()
            }
        };

        if status.success() {
            if !diagnostics.is_empty() {
                debug!("FFmpeg diagnostics: {}", diagnostics.trim());
            }
            Ok(())
        } else {
            let message = match status.code() {
                Some(code) => format!("FFmpeg exited with status {}", code),
                None => "FFmpeg terminated by signal".to_string(),
            };
            Err(MediaError::ffmpeg_failed(
                message,
                Some(diagnostics),
                status.code(),
            ))
        }
    }
}

/// Drain `reader`, keeping only the last `max` bytes.
async fn capture_tail<R>(mut reader: R, max: usize) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = TailBuffer::new(max);
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        tail.push(&chunk[..n]);
    }
    Ok(tail.into_string())
}

/// Byte buffer that keeps the most recent `max` bytes.
#[derive(Debug)]
struct TailBuffer {
    buf: Vec<u8>,
    max: usize,
    dropped: usize,
}

impl TailBuffer {
    fn new(max: usize) -> Self {
        Self {
            buf: Vec::new(),
            max,
            dropped: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.max {
            let excess = self.buf.len() - self.max;
            self.buf.drain(..excess);
            self.dropped += excess;
        }
    }

    fn into_string(self) -> String {
        let text = String::from_utf8_lossy(&self.buf);
        if self.dropped > 0 {
            format!("[{} bytes truncated]\n{}", self.dropped, text)
        } else {
            text.into_owned()
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
