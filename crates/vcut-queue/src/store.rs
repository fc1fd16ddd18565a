//! Job store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use vcut_models::{Job, JobId, JobPatch};

use crate::error::{QueueError, QueueResult};

/// Table of job records keyed by job ID.
///
/// Implementations must make `update` atomic per job: readers see either
/// the record before the patch or after it, never a mix.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record. Fails if the ID is already present.
    async fn insert(&self, job: Job) -> QueueResult<()>;

    /// Snapshot of a record.
    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>>;

    /// Merge `patch` into the record and return the updated snapshot.
    async fn update(&self, id: &JobId, patch: JobPatch) -> QueueResult<Job>;

    /// Number of records.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-local job store. Records live until the process exits.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> QueueResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(QueueError::Duplicate(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> QueueResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn update(&self, id: &JobId, patch: JobPatch) -> QueueResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or_else(|| QueueError::not_found(id))?;
        job.apply(patch)?;
        Ok(job.clone())
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use vcut_models::JobStatus;

    fn job() -> Job {
        Job::new(JobId::new(), "/tmp/vcut/x", 1)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryJobStore::new();
        let job = job();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Queued);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.insert(job.clone()).await.unwrap();
        assert!(matches!(
            store.insert(job).await,
            Err(QueueError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let store = InMemoryJobStore::new();
        let job = job();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let updated = store
            .update(&id, JobPatch::phase(JobStatus::Downloading))
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Downloading);
        assert_eq!(updated.progress, 5);
        assert_eq!(updated.work_dir, std::path::PathBuf::from("/tmp/vcut/x"));
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let store = InMemoryJobStore::new();
        let err = store
            .update(&JobId::new(), JobPatch::progress(1))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejected_patch_leaves_record_intact() {
        let store = InMemoryJobStore::new();
        let job = job();
        let id = job.id.clone();
        store.insert(job).await.unwrap();
        store.update(&id, JobPatch::failed("boom")).await.unwrap();

        let err = store
            .update(&id, JobPatch::phase(JobStatus::Downloading))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Transition(_)));

        let current = store.get(&id).await.unwrap().unwrap();
        assert_eq!(current.status, JobStatus::Failed);
        assert_eq!(current.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_concurrent_point_updates() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut ids = Vec::new();
        for _ in 0..32 {
            let job = job();
            ids.push(job.id.clone());
            store.insert(job).await.unwrap();
        }

        let mut handles = Vec::new();
        for id in ids.clone() {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update(&id, JobPatch::phase(JobStatus::Downloading))
                    .await
                    .unwrap();
                store
                    .update(&id, JobPatch::failed("stopped"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for id in ids {
            let job = store.get(&id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.progress, 0);
        }
    }
}
