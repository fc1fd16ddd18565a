//! Job executor.
//!
//! A single dispatcher drains the queue. It takes a semaphore permit before
//! receiving the next job, so jobs start in queue order and at most
//! `concurrency` of them run at once. Each job runs in its own task; an
//! error or a panic inside it becomes a `failed` job record and never
//! reaches the dispatcher.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{error, info, warn, Instrument};

use vcut_models::JobPatch;
use vcut_queue::{JobReceiver, QueuedJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::RenderPipeline;

/// Message recorded on jobs still queued when the worker stops.
const SHUTDOWN_MESSAGE: &str = "worker shut down before the job started";

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    pipeline: RenderPipeline,
    receiver: Mutex<JobReceiver>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, pipeline: RenderPipeline, receiver: JobReceiver) -> Self {
        let concurrency = config.concurrency.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            pipeline,
            receiver: Mutex::new(receiver),
            job_semaphore: Arc::new(Semaphore::new(concurrency)),
            shutdown,
        }
    }

    fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    /// Run until shutdown is signalled or every queue handle is dropped.
    pub async fn run(&self) -> WorkerResult<()> {
        let mut receiver = self
            .receiver
            .try_lock()
            .map_err(|_| WorkerError::AlreadyRunning)?;
        let mut shutdown_rx = self.shutdown.subscribe();

        info!(
            concurrency = self.concurrency(),
            work_dir = %self.config.work_dir.display(),
            "Starting job executor"
        );

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }

            let permit = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                job = receiver.recv() => match job {
                    Some(job) => job,
                    None => {
                        info!("Job queue closed, stopping executor");
                        break;
                    }
                },
            };

            self.dispatch(permit, job);
        }

        receiver.close();
        self.fail_pending(&mut receiver).await;

        info!("Waiting for in-flight jobs to complete...");
        let all = self.concurrency() as u32;
        match tokio::time::timeout(
            self.config.shutdown_timeout,
            self.job_semaphore.acquire_many(all),
        )
        .await
        {
            Ok(_) => info!("Job executor stopped"),
            Err(_) => warn!(
                in_flight = self.in_flight(),
                "Shutdown timeout elapsed with jobs still running"
            ),
        }

        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        // Stored even if run() has not subscribed yet
        self.shutdown.send_replace(true);
    }

    /// Jobs currently executing.
    pub fn in_flight(&self) -> usize {
        self.concurrency()
            .saturating_sub(self.job_semaphore.available_permits())
    }

    fn dispatch(&self, permit: OwnedSemaphorePermit, job: QueuedJob) {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let _permit = permit;
            Self::execute_job(pipeline, job).await;
        });
    }

    /// Execute a single job and record its outcome.
    async fn execute_job(pipeline: RenderPipeline, job: QueuedJob) {
        let job_id = job.job_id.clone();
        let logger = JobLogger::new(&job_id, job.request.clips.len());
        let started = Instant::now();
        metrics::record_job_started();

        // Inner task so a panic surfaces as a JoinError instead of
        // unwinding through the permit holder.
        let runner = pipeline.clone();
        let span = logger.create_span();
        let handle = tokio::spawn(async move { runner.run(&job).await }.instrument(span));

        let (message, reason) = match handle.await {
            Ok(Ok(_)) => {
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                return;
            }
            Ok(Err(e)) => (e.failure_message(), "error"),
            Err(e) if e.is_panic() => (
                format!("render task panicked: {}", panic_message(e.into_panic())),
                "panic",
            ),
            Err(_) => ("render task was cancelled".to_string(), "cancelled"),
        };

        logger.log_error(&message);
        metrics::record_job_failed(reason, started.elapsed().as_secs_f64());

        if let Err(e) = pipeline
            .store()
            .update(&job_id, JobPatch::failed(message))
            .await
        {
            error!(job_id = %job_id, "Failed to record job failure: {}", e);
        }
    }

    /// Fail jobs that were accepted but will never be started.
    async fn fail_pending(&self, receiver: &mut JobReceiver) {
        while let Some(job) = receiver.try_recv() {
            warn!(job_id = %job.job_id, "Dropping queued job on shutdown");
            if let Err(e) = self
                .pipeline
                .store()
                .update(&job.job_id, JobPatch::failed(SHUTDOWN_MESSAGE))
                .await
            {
                error!(job_id = %job.job_id, "Failed to record job failure: {}", e);
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
