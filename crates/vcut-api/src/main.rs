//! Render service binary: HTTP API plus the in-process render worker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vcut_api::{create_router, metrics, ApiConfig, AppState};
use vcut_queue::{InMemoryJobStore, JobQueue, JobStore};
use vcut_worker::{JobExecutor, RenderPipeline, WorkerConfig};

/// How often idle rate limiter entries are pruned.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing();

    info!("Starting vcut-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        "API config: host={}, port={}, concurrency={}, work_dir={}",
        config.host,
        config.port,
        worker_config.concurrency,
        worker_config.work_dir.display()
    );

    match vcut_media::check_ffmpeg() {
        Ok(path) => info!("Using FFmpeg at {}", path.display()),
        Err(e) => warn!("{}; render jobs will fail until it is installed", e),
    }

    // Job store, queue and worker
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let (queue, receiver) = JobQueue::new(Arc::clone(&store), worker_config.queue_config());
    let pipeline = RenderPipeline::from_config(&worker_config, store)
        .context("Failed to build render pipeline")?;
    let executor = Arc::new(JobExecutor::new(worker_config, pipeline, receiver));

    let worker = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            if let Err(e) = executor.run().await {
                error!("Job executor stopped with error: {}", e);
            }
        })
    };

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        let handle = metrics::init_metrics()
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
        Some(handle)
    } else {
        None
    };

    let state = AppState::new(config.clone(), queue);

    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("HTTP server stopped, draining render worker");
    executor.shutdown();
    if let Err(e) = worker.await {
        error!("Job executor task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vcut=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
