//! Worker pool.
//!
//! A fixed set of workers drains the job queue. Each worker loads the job,
//! flips its entry to running, runs the branch for the source kind into the
//! job's staging directory, and either promotes the staged bundle or
//! discards it and records the failure. Errors never kill a worker.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vidsum_models::{ArtifactRecord, BundleManifest, JobId, SourceType, BUNDLE_FORMAT_VERSION};
use vidsum_queue::{CancelRegistry, JobQueue};
use vidsum_store::StoreError;

use crate::context::{ProcessingContext, StageContext};
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{run_local_branch, run_url_branch};

/// Fixed pool of pipeline workers.
pub struct WorkerPool {
    ctx: Arc<ProcessingContext>,
    queue: Arc<JobQueue>,
    cancels: CancelRegistry,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn new(ctx: Arc<ProcessingContext>, queue: Arc<JobQueue>, cancels: CancelRegistry) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx,
            queue,
            cancels,
            shutdown,
        }
    }

    /// Spawn the worker tasks.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let count = self.ctx.config.worker_count.max(1);
        info!("Starting {} pipeline workers", count);

        (0..count)
            .map(|idx| {
                let ctx = Arc::clone(&self.ctx);
                let queue = Arc::clone(&self.queue);
                let cancels = self.cancels.clone();
                let shutdown = self.shutdown.subscribe();
                tokio::spawn(async move {
                    worker_loop(idx, ctx, queue, cancels, shutdown).await;
                })
            })
            .collect()
    }

    /// Signal shutdown and cancel all in-flight jobs. Workers exit after
    /// their current job observes the cancellation.
    pub fn shutdown(&self) {
        info!("Worker pool shutting down");
        let _ = self.shutdown.send(true);
        self.cancels.cancel_all();
    }
}

async fn worker_loop(
    idx: usize,
    ctx: Arc<ProcessingContext>,
    queue: Arc<JobQueue>,
    cancels: CancelRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Worker {} started", idx);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            job_id = queue.dequeue() => {
                let Some(job_id) = job_id else { break };
                run_job(&ctx, &cancels, job_id).await;
            }
        }
    }
    debug!("Worker {} stopped", idx);
}

/// Execute one job end to end. Never propagates errors: every failure path
/// records on the job and entry, and the worker continues.
pub(crate) async fn run_job(ctx: &Arc<ProcessingContext>, cancels: &CancelRegistry, job_id: JobId) {
    let entry = match ctx.store.mark_running(&job_id).await {
        Ok(entry) => entry,
        Err(StoreError::NotFound(_)) => {
            // Deleted while queued
            debug!(job_id = job_id.as_str(), "Job vanished before running, skipping");
            return;
        }
        Err(e) => {
            error!(job_id = job_id.as_str(), "Could not start job: {}", e);
            return;
        }
    };

    info!(
        job_id = job_id.as_str(),
        cache_key = entry.cache_key.as_str(),
        source_type = entry.source_type.as_str(),
        "Job started"
    );

    let cancel_rx = cancels.register(&job_id);
    let result = run_pipeline(ctx, &job_id, &entry, &cancel_rx).await;
    cancels.unregister(&job_id);

    match result {
        Ok((stage, bundle_path)) => {
            let summary = stage.summary_text.as_deref().unwrap_or_default();
            match ctx
                .store
                .mark_completed(
                    &job_id,
                    summary,
                    stage.source_name.as_deref(),
                    &bundle_path.to_string_lossy(),
                )
                .await
            {
                Ok(()) => info!(job_id = job_id.as_str(), "Job completed"),
                Err(e) => error!(
                    job_id = job_id.as_str(),
                    "Bundle promoted but completion not recorded: {}", e
                ),
            }
        }
        Err(e) => {
            ctx.bundles.discard(&job_id).await;
            let record = e.record_string();
            warn!(job_id = job_id.as_str(), "Job failed: {}", record);
            if let Err(store_err) = ctx.store.mark_failed(&job_id, &record).await {
                error!(
                    job_id = job_id.as_str(),
                    "Failure not recorded: {}", store_err
                );
            }
        }
    }
}

async fn run_pipeline(
    ctx: &Arc<ProcessingContext>,
    job_id: &JobId,
    entry: &vidsum_models::CacheEntry,
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<(StageContext, std::path::PathBuf)> {
    let staging = ctx.bundles.stage(job_id).await?;

    let stage = match entry.source_type {
        SourceType::Url => run_url_branch(ctx, &staging, &entry.source_ref, cancel).await?,
        SourceType::Local => run_local_branch(ctx, &staging, &entry.source_ref, cancel).await?,
    };

    let summary = stage
        .summary_text
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WorkerError::internal("pipeline produced no summary"))?;

    let manifest = BundleManifest {
        format_version: BUNDLE_FORMAT_VERSION,
        profile_version: entry.profile_version.clone(),
        cache_key: entry.cache_key.clone(),
        source_type: entry.source_type,
        source_ref: entry.source_ref.clone(),
        status: "completed".to_string(),
        created_at: entry.created_at,
        completed_at: Utc::now(),
        summary_text: summary,
        artifacts: staged_artifacts(&staging).await?,
    };

    let bundle_path = ctx.bundles.promote(job_id, manifest).await?;
    Ok((stage, bundle_path))
}

/// Enumerate the staged files as manifest artifacts. Sizes and hashes are
/// filled in during promotion.
async fn staged_artifacts(staging: &Path) -> WorkerResult<Vec<ArtifactRecord>> {
    let mut artifacts = Vec::new();
    let mut entries = tokio::fs::read_dir(staging).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.metadata().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == vidsum_models::MANIFEST_FILE_NAME || name.starts_with('.') {
            continue;
        }
        artifacts.push(ArtifactRecord {
            name: name.clone(),
            path: name,
            size: 0,
            sha256: String::new(),
        });
    }
    artifacts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(artifacts)
}
