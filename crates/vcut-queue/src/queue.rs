//! Bounded FIFO job queue.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::info;

use vcut_models::{Job, JobId, JobStatus, OutputGeometry, RenderRequest};

use crate::error::{QueueError, QueueResult};
use crate::store::JobStore;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of accepted jobs waiting for the worker
    pub capacity: usize,
    /// Parent of per-job working directories
    pub work_root: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            work_root: PathBuf::from("/tmp/vcut"),
        }
    }
}

/// A unit of work handed to the worker.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub request: RenderRequest,
    pub geometry: OutputGeometry,
    /// Job-exclusive directory, created by the worker when the job starts
    pub work_dir: PathBuf,
}

/// Consumer side of the queue. Owned by the single executor.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<QueuedJob>,
}

impl JobReceiver {
    /// Next job in arrival order, or `None` once every `JobQueue` handle is gone.
    pub async fn recv(&mut self) -> Option<QueuedJob> {
        self.rx.recv().await
    }

    /// Next job if one is already waiting.
    pub fn try_recv(&mut self) -> Option<QueuedJob> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new jobs; already queued jobs can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Producer side of the queue plus read access to job state.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    tx: mpsc::Sender<QueuedJob>,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a queue over `store`.
    pub fn new(store: Arc<dyn JobStore>, config: QueueConfig) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        (Self { store, tx, config }, JobReceiver { rx })
    }

    /// Validate and accept a render request.
    ///
    /// Returns immediately with the new job ID. A rejected request never
    /// creates a job record.
    pub async fn submit(&self, request: RenderRequest) -> QueueResult<JobId> {
        let geometry = request.check()?;

        // Reserve the slot first so a full queue leaves no orphan record.
        let permit = self.tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => QueueError::QueueFull {
                capacity: self.config.capacity,
            },
            TrySendError::Closed(()) => QueueError::Closed,
        })?;

        let job_id = JobId::new();
        let work_dir = self.config.work_root.join(job_id.as_str());
        let clip_count = request.clips.len();

        self.store
            .insert(Job::new(job_id.clone(), &work_dir, clip_count))
            .await?;

        permit.send(QueuedJob {
            job_id: job_id.clone(),
            request,
            geometry,
            work_dir,
        });

        info!(
            job_id = %job_id,
            clips = clip_count,
            width = geometry.width,
            height = geometry.height,
            fps = geometry.fps,
            "Job queued"
        );

        Ok(job_id)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, job_id: &JobId) -> QueueResult<Job> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| QueueError::not_found(job_id))
    }

    /// Path of a finished job's artifact.
    pub async fn artifact(&self, job_id: &JobId) -> QueueResult<PathBuf> {
        let job = self.status(job_id).await?;
        match (job.status, job.output_path) {
            (JobStatus::Completed, Some(path)) => Ok(path),
            (status, _) => Err(QueueError::NotReady {
                job_id: job.id,
                status,
            }),
        }
    }

    /// Jobs accepted but not yet taken by the worker.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether the worker side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::store::InMemoryJobStore;
    use vcut_models::{ClipSpec, JobPatch};

    fn setup(capacity: usize) -> (JobQueue, JobReceiver, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        let config = QueueConfig {
            capacity,
            work_root: PathBuf::from("/tmp/vcut-test"),
        };
        let (queue, rx) = JobQueue::new(store.clone(), config);
        (queue, rx, store)
    }

    fn request() -> RenderRequest {
        RenderRequest::new(
            "https://x/video.mp4",
            vec![ClipSpec::new(0.0, 5.0), ClipSpec::new(10.0, 12.0)],
        )
    }

    #[tokio::test]
    async fn test_submit_creates_queued_job() {
        let (queue, mut rx, _store) = setup(8);
        let job_id = queue.submit(request()).await.unwrap();

        let job = queue.status(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert_eq!(job.clip_count, 2);
        assert_eq!(job.work_dir, PathBuf::from("/tmp/vcut-test").join(job_id.as_str()));

        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.job_id, job_id);
        assert_eq!(queued.geometry, OutputGeometry::default());
    }

    #[tokio::test]
    async fn test_ids_unique() {
        let (queue, _rx, _store) = setup(128);
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let id = assert_ok!(queue.submit(request()).await);
            assert!(ids.insert(id));
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut rx, _store) = setup(16);
        let mut submitted = Vec::new();
        for _ in 0..5 {
            submitted.push(queue.submit(request()).await.unwrap());
        }
        for expected in submitted {
            assert_eq!(rx.recv().await.unwrap().job_id, expected);
        }
    }

    #[tokio::test]
    async fn test_empty_clips_rejected_without_record() {
        let (queue, _rx, store) = setup(8);
        let err = queue
            .submit(RenderRequest::new("https://x/video.mp4", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Validation(_)));
        assert!(err.is_client_error());
        assert_eq!(store.len().await, 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejected_without_record() {
        let (queue, _rx, store) = setup(2);
        queue.submit(request()).await.unwrap();
        queue.submit(request()).await.unwrap();

        let err = assert_err!(queue.submit(request()).await);
        assert!(matches!(err, QueueError::QueueFull { capacity: 2 }));
        assert_eq!(store.len().await, 2);
        assert_eq!(queue.pending(), 2);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, rx, _store) = setup(2);
        drop(rx);
        assert!(queue.is_closed());
        assert!(matches!(
            queue.submit(request()).await,
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (queue, _rx, _store) = setup(2);
        let id = JobId::new();
        assert!(matches!(queue.status(&id).await, Err(QueueError::NotFound(_))));
        assert!(matches!(queue.artifact(&id).await, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_artifact_only_when_completed() {
        let (queue, _rx, store) = setup(2);
        let id = queue.submit(request()).await.unwrap();

        assert!(matches!(
            queue.artifact(&id).await,
            Err(QueueError::NotReady {
                status: JobStatus::Queued,
                ..
            })
        ));

        for status in [
            JobStatus::Downloading,
            JobStatus::Preparing,
            JobStatus::Rendering,
        ] {
            store.update(&id, JobPatch::phase(status)).await.unwrap();
        }
        let output = PathBuf::from("/tmp/vcut-test/out.mp4");
        store
            .update(&id, JobPatch::completed(&output))
            .await
            .unwrap();

        assert_eq!(queue.artifact(&id).await.unwrap(), output);
    }
}
