//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vcut_media::{
    FetchConfig, FfmpegRunner, RenderSettings, DEFAULT_MAX_STDERR_BYTES, MIN_STDERR_BYTES,
};
use vcut_queue::QueueConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs executed at the same time. Rendering is serialized at 1.
    pub concurrency: usize,
    /// Jobs that may wait in the queue before intake is refused
    pub queue_capacity: usize,
    /// Root of per-job working directories
    pub work_dir: PathBuf,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Cap on captured FFmpeg stderr
    pub max_stderr_bytes: usize,
    /// FFmpeg executable; `ffmpeg` on PATH when unset
    pub ffmpeg_binary: Option<PathBuf>,
    /// Source fetch connect timeout
    pub fetch_connect_timeout: Duration,
    /// Source fetch whole-transfer timeout
    pub fetch_timeout: Option<Duration>,
    /// x264 preset
    pub ffmpeg_preset: String,
    /// x264 CRF
    pub ffmpeg_crf: u8,
    /// AAC bitrate
    pub ffmpeg_audio_bitrate: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let render = RenderSettings::default();
        Self {
            concurrency: 1,
            queue_capacity: QueueConfig::default().capacity,
            work_dir: PathBuf::from("/tmp/vcut"),
            shutdown_timeout: Duration::from_secs(30),
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
            ffmpeg_binary: None,
            fetch_connect_timeout: Duration::from_secs(10),
            fetch_timeout: None,
            ffmpeg_preset: render.preset,
            ffmpeg_crf: render.crf,
            ffmpeg_audio_bitrate: render.audio_bitrate,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            concurrency: env_parse("WORKER_CONCURRENCY")
                .unwrap_or(defaults.concurrency)
                .max(1),
            queue_capacity: env_parse("WORKER_QUEUE_CAPACITY")
                .unwrap_or(defaults.queue_capacity)
                .max(1),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            max_stderr_bytes: env_parse("WORKER_MAX_STDERR_BYTES")
                .unwrap_or(defaults.max_stderr_bytes)
                .max(MIN_STDERR_BYTES),
            ffmpeg_binary: std::env::var("FFMPEG_PATH").ok().map(PathBuf::from),
            fetch_connect_timeout: env_parse("FETCH_CONNECT_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_connect_timeout),
            fetch_timeout: env_parse("FETCH_TIMEOUT").map(Duration::from_secs),
            ffmpeg_preset: std::env::var("FFMPEG_PRESET").unwrap_or(defaults.ffmpeg_preset),
            ffmpeg_crf: env_parse("FFMPEG_CRF")
                .filter(|crf| *crf <= 51)
                .unwrap_or(defaults.ffmpeg_crf),
            ffmpeg_audio_bitrate: std::env::var("FFMPEG_AUDIO_BITRATE")
                .unwrap_or(defaults.ffmpeg_audio_bitrate),
        }
    }

    /// Queue settings derived from this config.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue_capacity,
            work_root: self.work_dir.clone(),
        }
    }

    /// HTTP client settings for source downloads.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            connect_timeout: self.fetch_connect_timeout,
            timeout: self.fetch_timeout,
            ..FetchConfig::default()
        }
    }

    /// Output codec parameters.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            preset: self.ffmpeg_preset.clone(),
            crf: self.ffmpeg_crf,
            audio_bitrate: self.ffmpeg_audio_bitrate.clone(),
            ..RenderSettings::default()
        }
    }

    /// FFmpeg runner with this config's binary and diagnostic cap.
    pub fn ffmpeg_runner(&self) -> FfmpegRunner {
        let runner = FfmpegRunner::new().with_max_stderr_bytes(self.max_stderr_bytes);
        match &self.ffmpeg_binary {
            Some(binary) => runner.with_binary(binary),
            None => runner,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
