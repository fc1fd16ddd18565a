//! Per-job render pipeline.
//!
//! Runs one job through its phases against the store:
//! `downloading` (source fetch) → `preparing` (graph compiled) →
//! `rendering` (engine running) → `completed`. Errors are returned to the
//! caller, which owns the `failed` transition.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;

use vcut_media::{compile, FfmpegEngine, HttpFetcher, MediaFetcher, RenderEngine};
use vcut_models::{ClipSpec, JobPatch, JobStatus};
use vcut_queue::{JobStore, QueuedJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// File name of the fetched source inside a job's working directory.
pub const SOURCE_FILE_NAME: &str = "source.mp4";

/// File name of the rendered artifact inside a job's working directory.
pub const OUTPUT_FILE_NAME: &str = "output.mp4";

/// Fetch, compile and render collaborators for one worker.
#[derive(Clone)]
pub struct RenderPipeline {
    fetcher: Arc<dyn MediaFetcher>,
    engine: Arc<dyn RenderEngine>,
    store: Arc<dyn JobStore>,
}

impl RenderPipeline {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        engine: Arc<dyn RenderEngine>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            fetcher,
            engine,
            store,
        }
    }

    /// HTTP fetcher and FFmpeg engine configured from `config`.
    pub fn from_config(config: &WorkerConfig, store: Arc<dyn JobStore>) -> WorkerResult<Self> {
        let fetcher = HttpFetcher::new(config.fetch_config())?;
        let engine = FfmpegEngine::new(config.ffmpeg_runner(), config.render_settings());
        Ok(Self::new(Arc::new(fetcher), Arc::new(engine), store))
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run `job` to `completed` and return the artifact path.
    pub async fn run(&self, job: &QueuedJob) -> WorkerResult<PathBuf> {
        let logger = JobLogger::new(&job.job_id, job.request.clips.len());
        let started = Instant::now();
        let output_secs: f64 = job.request.clips.iter().map(ClipSpec::duration).sum();
        logger.log_start(&job.request.source_url, output_secs);

        self.prepare_work_dir(job).await?;
        let source = job.work_dir.join(SOURCE_FILE_NAME);
        let output = job.work_dir.join(OUTPUT_FILE_NAME);

        self.advance(job, &logger, JobStatus::Downloading).await?;
        let bytes = self.fetcher.fetch(&job.request.source_url, &source).await?;
        if bytes == 0 {
            logger.log_warning("source download is empty");
        }

        let graph = compile(&job.request.clips, &job.geometry)?;
        tracing::debug!(
            job_id = %job.job_id,
            trims = graph.trim_count(),
            filter = %graph,
            "Filter graph compiled"
        );
        self.advance(job, &logger, JobStatus::Preparing).await?;

        self.advance(job, &logger, JobStatus::Rendering).await?;
        self.engine.render(&source, &graph, &output).await?;

        if fs::metadata(&output).await.is_err() {
            return Err(WorkerError::job_failed(format!(
                "render finished without producing {}",
                output.display()
            )));
        }

        self.store
            .update(&job.job_id, JobPatch::completed(&output))
            .await?;
        logger.log_completion(&output.display().to_string(), started.elapsed().as_secs_f64());

        Ok(output)
    }

    /// Create the job's directory. Fails if it already exists so a
    /// directory is never shared between runs.
    async fn prepare_work_dir(&self, job: &QueuedJob) -> WorkerResult<()> {
        if let Some(root) = job.work_dir.parent() {
            fs::create_dir_all(root)
                .await
                .map_err(|source| WorkerError::WorkDir {
                    path: root.to_path_buf(),
                    source,
                })?;
        }
        fs::create_dir(&job.work_dir)
            .await
            .map_err(|source| WorkerError::WorkDir {
                path: job.work_dir.clone(),
                source,
            })
    }

    async fn advance(
        &self,
        job: &QueuedJob,
        logger: &JobLogger,
        status: JobStatus,
    ) -> WorkerResult<()> {
        self.store
            .update(&job.job_id, JobPatch::phase(status))
            .await?;
        logger.log_phase(status);
        Ok(())
    }
}
