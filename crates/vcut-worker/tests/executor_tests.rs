//! Executor integration tests with scripted fetch and render collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use vcut_media::{FetchConfig, FilterGraph, HttpFetcher, MediaError, MediaFetcher, MediaResult, RenderEngine};
use vcut_models::{ClipSpec, Job, JobId, JobStatus, RenderRequest};
use vcut_queue::{InMemoryJobStore, JobQueue, JobStore, QueueConfig};
use vcut_worker::{JobExecutor, RenderPipeline, WorkerConfig, OUTPUT_FILE_NAME};

/// Writes a small file, fails for URLs containing `fail`, panics for `panic`.
#[derive(Default)]
struct ScriptedFetcher {
    fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        self.fetched.lock().unwrap().push(url.to_string());
        if url.contains("panic") {
            panic!("fetcher exploded");
        }
        if url.contains("fail") {
            return Err(MediaError::fetch_failed(
                format!("HTTP 503 Service Unavailable from {}", url),
                Some(503),
            ));
        }
        tokio::fs::write(dest, b"source").await?;
        Ok(6)
    }
}

/// Tracks overlapping renders and optionally blocks until released.
#[derive(Default)]
struct ScriptedEngine {
    active: AtomicUsize,
    max_active: AtomicUsize,
    renders: AtomicUsize,
    gate: Option<Arc<Notify>>,
    graphs: Mutex<Vec<String>>,
}

#[async_trait]
impl RenderEngine for ScriptedEngine {
    async fn render(&self, source: &Path, graph: &FilterGraph, output: &Path) -> MediaResult<()> {
        assert!(source.exists());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.graphs.lock().unwrap().push(graph.to_filter_complex());

        match &self.gate {
            Some(gate) => gate.notified().await,
            None => tokio::time::sleep(Duration::from_millis(20)).await,
        }

        tokio::fs::write(output, b"rendered").await?;
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<InMemoryJobStore>,
    queue: JobQueue,
    executor: Arc<JobExecutor>,
}

fn harness(fetcher: Arc<dyn MediaFetcher>, engine: Arc<dyn RenderEngine>) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = WorkerConfig {
        work_dir: dir.path().join("jobs"),
        shutdown_timeout: Duration::from_secs(5),
        ..WorkerConfig::default()
    };
    let store = Arc::new(InMemoryJobStore::new());
    let (queue, receiver) = JobQueue::new(store.clone(), config.queue_config());
    let pipeline = RenderPipeline::new(fetcher, engine, store.clone());
    let executor = Arc::new(JobExecutor::new(config, pipeline, receiver));
    Harness {
        _dir: dir,
        store,
        queue,
        executor,
    }
}

fn spawn_executor(executor: &Arc<JobExecutor>) -> tokio::task::JoinHandle<()> {
    let executor = Arc::clone(executor);
    tokio::spawn(async move {
        executor.run().await.unwrap();
    })
}

fn request(url: &str) -> RenderRequest {
    RenderRequest::new(url, vec![ClipSpec::new(0.0, 5.0), ClipSpec::new(10.0, 12.0)])
}

async fn wait_terminal(store: &InMemoryJobStore, id: &JobId) -> Job {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let job = store.get(id).await.unwrap().unwrap();
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not finish")
}

async fn wait_status(store: &InMemoryJobStore, id: &JobId, status: JobStatus) -> Job {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let job = store.get(id).await.unwrap().unwrap();
            if job.status == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job never reached status")
}

#[tokio::test]
async fn test_jobs_run_one_at_a_time_in_submission_order() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let engine = Arc::new(ScriptedEngine::default());
    let h = harness(fetcher.clone(), engine.clone());

    let mut ids = Vec::new();
    let mut urls = Vec::new();
    for i in 0..5 {
        let url = format!("https://media.example/{}.mp4", i);
        ids.push(h.queue.submit(request(&url)).await.unwrap());
        urls.push(url);
    }
    let runner = spawn_executor(&h.executor);

    for id in &ids {
        let job = wait_terminal(&h.store, id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.error.is_none());
        let output = job.output_path.unwrap();
        assert_eq!(output, job.work_dir.join(OUTPUT_FILE_NAME));
        assert!(output.exists());
    }

    assert_eq!(engine.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(engine.renders.load(Ordering::SeqCst), 5);
    assert_eq!(*fetcher.fetched.lock().unwrap(), urls);

    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_status_reflects_phase_while_rendering() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(ScriptedEngine {
        gate: Some(gate.clone()),
        ..ScriptedEngine::default()
    });
    let h = harness(Arc::new(ScriptedFetcher::default()), engine.clone());

    let id = h.queue.submit(request("https://media.example/a.mp4")).await.unwrap();
    let queued = h.queue.status(&id).await.unwrap();
    assert_eq!(queued.status, JobStatus::Queued);
    assert_eq!(queued.progress, 0);

    let runner = spawn_executor(&h.executor);

    let rendering = wait_status(&h.store, &id, JobStatus::Rendering).await;
    assert_eq!(rendering.progress, 20);
    assert!(rendering.output_path.is_none());
    assert!(h.queue.artifact(&id).await.is_err());

    gate.notify_one();
    let done = wait_terminal(&h.store, &id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(h.queue.artifact(&id).await.unwrap(), done.output_path.unwrap());

    let graphs = engine.graphs.lock().unwrap();
    assert_eq!(graphs.len(), 1);
    assert!(graphs[0].contains("concat=n=2:v=1:a=0[vout]"));

    drop(graphs);
    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_fetch_error_fails_job_and_resets_progress() {
    let h = harness(
        Arc::new(ScriptedFetcher::default()),
        Arc::new(ScriptedEngine::default()),
    );
    let id = h
        .queue
        .submit(request("https://media.example/fail.mp4"))
        .await
        .unwrap();
    let runner = spawn_executor(&h.executor);

    let job = wait_terminal(&h.store, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0);
    assert!(job.output_path.is_none());
    assert!(job.error.unwrap().contains("HTTP 503"));

    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_invalid_clip_fails_job() {
    let engine = Arc::new(ScriptedEngine::default());
    let h = harness(Arc::new(ScriptedFetcher::default()), engine.clone());
    let id = h
        .queue
        .submit(RenderRequest::new(
            "https://media.example/a.mp4",
            vec![ClipSpec::new(0.0, 5.0), ClipSpec::new(8.0, 8.0)],
        ))
        .await
        .unwrap();
    let runner = spawn_executor(&h.executor);

    let job = wait_terminal(&h.store, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("Invalid clip"));
    assert_eq!(engine.renders.load(Ordering::SeqCst), 0);

    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_panic_fails_job_and_executor_continues() {
    let engine = Arc::new(ScriptedEngine::default());
    let h = harness(Arc::new(ScriptedFetcher::default()), engine.clone());

    let first = h
        .queue
        .submit(request("https://media.example/panic.mp4"))
        .await
        .unwrap();
    let second = h
        .queue
        .submit(request("https://media.example/ok.mp4"))
        .await
        .unwrap();
    let runner = spawn_executor(&h.executor);

    let failed = wait_terminal(&h.store, &first).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("fetcher exploded"));

    let completed = wait_terminal(&h.store, &second).await;
    assert_eq!(completed.status, JobStatus::Completed);

    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_source_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::default()).unwrap());
    let h = harness(fetcher, Arc::new(ScriptedEngine::default()));
    let id = h
        .queue
        .submit(request(&format!("{}/gone.mp4", server.uri())))
        .await
        .unwrap();
    let runner = spawn_executor(&h.executor);

    let job = wait_terminal(&h.store, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0);
    let error = job.error.unwrap();
    assert!(error.starts_with("Fetch failed"), "{}", error);
    assert!(error.contains("404"), "{}", error);

    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_work_dirs_are_job_exclusive() {
    let h = harness(
        Arc::new(ScriptedFetcher::default()),
        Arc::new(ScriptedEngine::default()),
    );
    let a = h.queue.submit(request("https://media.example/a.mp4")).await.unwrap();
    let b = h.queue.submit(request("https://media.example/b.mp4")).await.unwrap();
    let runner = spawn_executor(&h.executor);

    let a = wait_terminal(&h.store, &a).await;
    let b = wait_terminal(&h.store, &b).await;
    assert_ne!(a.work_dir, b.work_dir);
    assert!(a.work_dir.ends_with(a.id.as_str()));
    assert!(b.work_dir.ends_with(b.id.as_str()));

    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_existing_work_dir_is_not_reused() {
    let h = harness(
        Arc::new(ScriptedFetcher::default()),
        Arc::new(ScriptedEngine::default()),
    );
    let id = h.queue.submit(request("https://media.example/a.mp4")).await.unwrap();
    let work_dir: PathBuf = h.queue.status(&id).await.unwrap().work_dir;
    std::fs::create_dir_all(&work_dir).unwrap();

    let runner = spawn_executor(&h.executor);
    let job = wait_terminal(&h.store, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("working directory"));

    h.executor.shutdown();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_fails_jobs_never_started() {
    let engine = Arc::new(ScriptedEngine::default());
    let h = harness(Arc::new(ScriptedFetcher::default()), engine.clone());
    let id = h.queue.submit(request("https://media.example/a.mp4")).await.unwrap();

    h.executor.shutdown();
    h.executor.run().await.unwrap();

    let job = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("shut down"));
    assert_eq!(engine.renders.load(Ordering::SeqCst), 0);
    assert!(h.queue.is_closed());
}

#[tokio::test]
async fn test_executor_stops_when_queue_dropped() {
    let h = harness(
        Arc::new(ScriptedFetcher::default()),
        Arc::new(ScriptedEngine::default()),
    );
    let id = h.queue.submit(request("https://media.example/a.mp4")).await.unwrap();
    let Harness {
        _dir,
        store,
        queue,
        executor,
    } = h;
    drop(queue);

    tokio::time::timeout(Duration::from_secs(10), executor.run())
        .await
        .unwrap()
        .unwrap();

    let job = store.get(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}
