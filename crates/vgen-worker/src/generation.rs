//! Video generation pool.
//!
//! Up to `min(keys, eligible items, max_workers)` workers drain the queue.
//! Each worker takes one API key from the shared rotation when it starts
//! and keeps it for its whole life. A worker loops: claim the next
//! `queued` or `error` item, submit it, poll until the remote operation is
//! done, download the video, record the result. Each item is attempted at
//! most once per run, so a failure waits for the next run. A worker stops
//! when nothing is left to claim or when the run's token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use vgen_client::{VideoBackend, VideoRequest};
use vgen_models::{ItemState, VideoArtifact, WorkItem};
use vgen_queue::JobQueue;

use crate::cancel::PoolKind;
use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::error::{is_credential_message, WorkerError, WorkerResult};
use crate::logging::ItemLogger;
use crate::metrics;
use crate::prompt::MISSING_INPUT_MESSAGE;

/// How a pool run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

/// Result of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub outcome: RunOutcome,
    /// Workers spawned
    pub workers: usize,
    /// Items that reached `complete`
    pub completed: usize,
    /// Items that ended in `error`
    pub errors: usize,
    /// In-flight items put back to `queued` after the join
    pub requeued: usize,
}

impl GenerationSummary {
    /// Final status line for the run.
    pub fn status_message(&self) -> String {
        match (self.outcome, self.errors) {
            (RunOutcome::Cancelled, _) => "Generation cancelled.".to_string(),
            (RunOutcome::Completed, 0) => "All videos generated successfully.".to_string(),
            (RunOutcome::Completed, n) => format!("Generation complete with {} error(s).", n),
        }
    }
}

#[derive(Debug, Default)]
struct WorkerReport {
    completed: usize,
    errors: usize,
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn interruptible_sleep(duration: Duration, cancel: &CancellationToken) -> WorkerResult<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(WorkerError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Re-queues claimed items when a run is dropped before joining its
/// workers. Dropping the run aborts them mid-item.
struct RequeueOnDrop {
    queue: Arc<JobQueue>,
    cancel: CancellationToken,
    armed: bool,
}

impl RequeueOnDrop {
    fn new(queue: Arc<JobQueue>, cancel: CancellationToken) -> Self {
        Self {
            queue,
            cancel,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RequeueOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.cancel.cancel();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("Generation run dropped outside a runtime; claimed items stay processing");
            return;
        };
        let queue = Arc::clone(&self.queue);
        handle.spawn(async move {
            let requeued = queue.requeue_processing().await;
            queue.reset_generation_claims().await;
            if requeued > 0 {
                metrics::record_items_requeued(requeued);
            }
            warn!(requeued, "Generation run dropped before finishing");
        });
    }
}

fn ensure_live(cancel: &CancellationToken) -> WorkerResult<()> {
    if cancel.is_cancelled() {
        Err(WorkerError::Cancelled)
    } else {
        Ok(())
    }
}

/// Generate one video: submit, poll, download.
///
/// The token is observed after every remote call and during each poll
/// delay; once it fires this returns `Cancelled`.
pub async fn generate_video(
    backend: &dyn VideoBackend,
    request: &VideoRequest,
    credential: &str,
    config: &WorkerConfig,
    cancel: &CancellationToken,
    logger: &ItemLogger,
) -> WorkerResult<VideoArtifact> {
    ensure_live(cancel)?;
    let operation = backend.submit_video_generation(request, credential).await?;
    ensure_live(cancel)?;
    logger.log_progress(&format!("submitted as {}", operation.name));

    let started = tokio::time::Instant::now();
    let status = loop {
        interruptible_sleep(config.poll_interval, cancel).await?;
        let status = backend.poll_video_operation(&operation, credential).await?;
        ensure_live(cancel)?;

        if status.done {
            break status;
        }
        if started.elapsed() >= config.poll_timeout {
            return Err(WorkerError::generation_failed("Video generation timed out"));
        }
        logger.log_progress("still generating");
    };

    if let Some(message) = status.error {
        return Err(WorkerError::generation_failed(message));
    }

    let video = match status.videos.first() {
        Some(video) => video,
        None if !status.filtered_reasons.is_empty() => {
            return Err(WorkerError::generation_failed(format!(
                "Video was blocked by safety filters: {}",
                status.filtered_reasons.join("; ")
            )));
        }
        None => {
            return Err(WorkerError::generation_failed(
                "Operation finished without a video",
            ));
        }
    };

    let bytes = backend.fetch_video_bytes(video, credential).await?;
    ensure_live(cancel)?;
    Ok(VideoArtifact::new(bytes))
}

/// Run the generation pool until the queue is drained or `cancel` fires.
///
/// Fails before touching any item when no keys are configured or nothing
/// is eligible.
pub async fn run_generation(
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) -> WorkerResult<GenerationSummary> {
    let key_count = ctx.keys.len();
    if key_count == 0 {
        let message = "No API keys configured.";
        ctx.activity.error(message);
        ctx.activity.set_status(message);
        return Err(WorkerError::config_error(message));
    }

    ctx.queue.reset_generation_claims().await;
    let eligible = ctx
        .queue
        .count_where(|item| item.status().is_generation_claimable() && item.is_eligible())
        .await;
    if eligible == 0 {
        let err = WorkerError::validation("No items to process.");
        ctx.activity.set_status(err.to_string());
        return Err(err);
    }

    ctx.activity.clear_notice();

    let worker_count = ctx.config.worker_count(key_count, eligible);
    ctx.activity.set_status(format!(
        "Generating {} video(s) with {} worker(s)...",
        eligible, worker_count
    ));
    ctx.activity.info(format!(
        "Starting generation of {} item(s) across {} worker(s)",
        eligible, worker_count
    ));

    // Declared before the join set so it drops after the workers abort.
    let mut requeue_guard = RequeueOnDrop::new(Arc::clone(&ctx.queue), cancel.clone());
    let mut workers = JoinSet::new();
    for worker in 0..worker_count {
        let Some(credential) = ctx.keys.next_key() else {
            break;
        };
        let ctx = Arc::clone(&ctx);
        let cancel = cancel.clone();
        workers.spawn(async move { generation_worker(ctx, worker, credential, cancel).await });
    }
    let spawned = workers.len();

    let mut completed = 0;
    let mut errors = 0;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(report) => {
                completed += report.completed;
                errors += report.errors;
            }
            Err(e) => error!("Generation worker terminated abnormally: {}", e),
        }
    }

    let requeued = ctx.queue.requeue_processing().await;
    ctx.queue.reset_generation_claims().await;
    requeue_guard.disarm();
    if requeued > 0 {
        metrics::record_items_requeued(requeued);
    }

    let outcome = if cancel.is_cancelled() {
        RunOutcome::Cancelled
    } else {
        RunOutcome::Completed
    };
    let summary = GenerationSummary {
        outcome,
        workers: spawned,
        completed,
        errors,
        requeued,
    };

    let message = summary.status_message();
    match outcome {
        RunOutcome::Cancelled => ctx.activity.warning(message.clone()),
        RunOutcome::Completed if errors > 0 => ctx.activity.warning(message.clone()),
        RunOutcome::Completed => ctx.activity.success(message.clone()),
    }
    ctx.activity.set_status(message);
    metrics::record_pool_run(PoolKind::Generation, outcome.as_str());

    info!(
        outcome = outcome.as_str(),
        workers = spawned,
        completed,
        errors,
        requeued,
        "Generation run finished"
    );
    Ok(summary)
}

async fn generation_worker(
    ctx: Arc<WorkerContext>,
    worker: usize,
    credential: String,
    cancel: CancellationToken,
) -> WorkerReport {
    let mut report = WorkerReport::default();
    info!(worker, "Generation worker started");

    while !cancel.is_cancelled() {
        let Some(item) = ctx.queue.claim_for_generation().await else {
            break;
        };

        let logger = ItemLogger::new(&item.id, PoolKind::Generation, worker);
        match process_item(&ctx, &item, &credential, &cancel, &logger)
            .instrument(logger.create_span())
            .await
        {
            Ok(()) => report.completed += 1,
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                logger.log_warning("cancelled; item will be re-queued");
                break;
            }
            Err(e) => {
                report.errors += 1;
                record_failure(&ctx, &item, &e, &logger).await;
            }
        }
    }

    info!(worker, completed = report.completed, errors = report.errors, "Generation worker finished");
    report
}

async fn process_item(
    ctx: &WorkerContext,
    item: &WorkItem,
    credential: &str,
    cancel: &CancellationToken,
    logger: &ItemLogger,
) -> WorkerResult<()> {
    let label = item.label();
    logger.log_start(&label);
    ctx.activity.info(format!("Generating video for {}", label));

    let prompt = item
        .effective_prompt(&ctx.config.fallback_prompt)
        .ok_or_else(|| WorkerError::validation(MISSING_INPUT_MESSAGE))?;
    let request = VideoRequest::new(prompt, item.image.clone());

    let artifact = generate_video(
        ctx.backend.as_ref(),
        &request,
        credential,
        &ctx.config,
        cancel,
        logger,
    )
    .await?;

    // The token is checked under the queue lock so nothing completes after
    // cancellation.
    let stored = ctx
        .queue
        .update(&item.id, |entry| {
            if cancel.is_cancelled() {
                return false;
            }
            entry.state = ItemState::complete(artifact.clone());
            true
        })
        .await?;
    if !stored {
        return Err(WorkerError::Cancelled);
    }

    let name = ctx.collector.register(item, artifact);
    ctx.activity.success(format!("Video ready for {} ({})", label, name));
    metrics::record_item_completed(PoolKind::Generation);
    logger.log_completion(&name);
    Ok(())
}

async fn record_failure(ctx: &WorkerContext, item: &WorkItem, err: &WorkerError, logger: &ItemLogger) {
    let message = err.to_string();
    logger.log_error(&message);

    if let Err(e) = ctx
        .queue
        .update(&item.id, |entry| entry.state = ItemState::error(message.clone()))
        .await
    {
        logger.log_warning(&format!("could not record failure: {}", e));
    }

    let credential_error = is_credential_message(&message);
    if credential_error {
        ctx.activity.raise_notice();
    }
    ctx.activity
        .error(format!("Failed to generate video for {}: {}", item.label(), message));
    metrics::record_item_failed(PoolKind::Generation, credential_error);
}
