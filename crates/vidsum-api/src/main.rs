//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidsum_api::{create_router, metrics, ApiConfig, AppState};
use vidsum_cache::{CacheConfig, CacheCoordinator, CacheJanitor};
use vidsum_engines::{transcriber_from_env, Summarizer, SummarizerConfig};
use vidsum_queue::{CancelRegistry, JobQueue, QueueConfig};
use vidsum_store::MetadataStore;
use vidsum_storage::{BundleStore, UploadConfig, UploadStore};
use vidsum_worker::{ProcessingContext, WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing();
    info!("Starting vidsum-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    // Stores
    let store = match MetadataStore::open(config.work_dir.join("metadata.db")).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open metadata store: {}", e);
            std::process::exit(1);
        }
    };
    let uploads = UploadStore::new(UploadConfig::from_env(&config.work_dir), store.clone());
    let bundles = BundleStore::new(&config.work_dir);

    // Queue and coordination
    let queue = Arc::new(JobQueue::new(QueueConfig::from_env()));
    let cancels = CancelRegistry::new();
    let cache_config = CacheConfig::from_env();
    let coordinator = CacheCoordinator::new(
        store.clone(),
        bundles.clone(),
        uploads.clone(),
        Arc::clone(&queue),
        cancels.clone(),
        cache_config.clone(),
    );

    // Sweep jobs a previous process lifetime left behind
    match coordinator.sweep_interrupted().await {
        Ok(0) => {}
        Ok(n) => info!("Swept {} interrupted jobs", n),
        Err(e) => error!("Startup sweep failed: {}", e),
    }

    // Engines
    let transcriber = transcriber_from_env();
    if transcriber.is_none() {
        info!("No transcriber configured; transcription stages will fail (set ASR_URL or ASR_COMMAND)");
    }
    let summarizer = SummarizerConfig::from_env().map(|cfg| Arc::new(Summarizer::new(cfg)));
    if summarizer.is_none() {
        info!("No summarizer configured; summary jobs will fail (set LLM_URL)");
    }

    // Worker pool
    let worker_config = WorkerConfig::from_env();
    let processing = Arc::new(ProcessingContext::new(
        worker_config,
        store.clone(),
        uploads.clone(),
        bundles.clone(),
        transcriber,
        summarizer,
    ));
    let pool = WorkerPool::new(processing, Arc::clone(&queue), cancels.clone());
    let worker_handles = pool.start();

    // Background maintenance
    let (bg_shutdown_tx, bg_shutdown_rx) = watch::channel(false);
    let reaper_uploads = uploads.clone();
    let reaper_shutdown = bg_shutdown_rx.clone();
    tokio::spawn(async move {
        reaper_uploads.run_reaper(reaper_shutdown).await;
    });
    let janitor = CacheJanitor::new(store.clone(), bundles.clone(), cache_config);
    let janitor_shutdown = bg_shutdown_rx;
    tokio::spawn(async move {
        janitor.run(janitor_shutdown).await;
    });

    // Metrics
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    // Serve
    let state = AppState::new(config.clone(), store, uploads, coordinator);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");
    info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
    }

    // Drain: cancel in-flight jobs, stop background tasks, join workers
    info!("Draining workers");
    pool.shutdown();
    let _ = bg_shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(30), handle).await;
    }

    info!("Server shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vidsum=info".parse().expect("valid directive"));

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
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
