//! Prompt generation.
//!
//! [`generate_prompt`] writes a video prompt for one item: a description
//! of the image when one is attached, otherwise a rephrasing of the
//! existing prompt. [`run_prompt_pass`] runs it over every eligible item
//! with a bounded worker pool.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use vgen_client::{ClientError, VideoBackend};
use vgen_models::{ItemId, ItemState, ItemStatus, WorkItem};
use vgen_queue::{JobQueue, QueueError};

use crate::cancel::PoolKind;
use crate::context::WorkerContext;
use crate::error::{is_credential_message, WorkerError, WorkerResult};
use crate::generation::RunOutcome;
use crate::logging::ItemLogger;
use crate::metrics;

/// Message stored on an item whose prompt generation failed.
pub const PROMPT_FAILED_MESSAGE: &str = "Prompt generation failed.";

/// Message for an item with neither an image nor a prompt.
pub const MISSING_INPUT_MESSAGE: &str = "Add an image or a prompt first.";

/// Result of a prompt pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptSummary {
    pub outcome: RunOutcome,
    pub workers: usize,
    pub generated: usize,
    pub failed: usize,
}

impl PromptSummary {
    pub fn status_message(&self) -> String {
        match (self.outcome, self.failed) {
            (RunOutcome::Cancelled, _) => "Prompt generation cancelled.".to_string(),
            (RunOutcome::Completed, 0) => "All prompts generated.".to_string(),
            (RunOutcome::Completed, n) => format!("Prompt generation complete with {} error(s).", n),
        }
    }
}

/// Generate and store a prompt for one item.
///
/// The item shows `generating-prompt` while the remote call runs. On
/// success the new prompt is stored and the previous status restored; on
/// failure the item moves to `error`.
pub async fn generate_prompt(
    queue: &JobQueue,
    backend: &dyn VideoBackend,
    id: &ItemId,
    credential: &str,
) -> WorkerResult<String> {
    run_prompt_generation(queue, backend, id, credential, None).await
}

async fn run_prompt_generation(
    queue: &JobQueue,
    backend: &dyn VideoBackend,
    id: &ItemId,
    credential: &str,
    cancel: Option<&CancellationToken>,
) -> WorkerResult<String> {
    let item = queue
        .update(id, |item| -> WorkerResult<WorkItem> {
            if !item.is_eligible() {
                return Err(WorkerError::validation(MISSING_INPUT_MESSAGE));
            }
            if item.status() == ItemStatus::Processing {
                return Err(QueueError::busy(&item.id).into());
            }
            if credential.trim().is_empty() {
                return Err(WorkerError::config_error("No API key available."));
            }
            item.state.begin_prompt_generation();
            Ok(item.clone())
        })
        .await??;

    let result = match (&item.image, item.prompt.as_deref()) {
        (Some(image), _) => backend.describe_image_for_video(image, credential).await,
        (None, Some(prompt)) => backend.rephrase_prompt(prompt.trim(), credential).await,
        (None, None) => Err(ClientError::InvalidInput(format!(
            "item {} has neither an image nor a prompt",
            id
        ))),
    };

    if cancel.is_some_and(|c| c.is_cancelled()) {
        queue
            .update(id, |item| item.state.finish_prompt_generation())
            .await?;
        return Err(WorkerError::Cancelled);
    }

    match result {
        Ok(text) => {
            let text = text.trim().to_string();
            queue
                .update(id, |item| {
                    item.prompt = Some(text.clone());
                    item.state.finish_prompt_generation();
                })
                .await?;
            Ok(text)
        }
        Err(e) => {
            queue
                .update(id, |item| item.state = ItemState::error(PROMPT_FAILED_MESSAGE))
                .await?;
            Err(WorkerError::PromptFailed(e.to_string()))
        }
    }
}

/// Run a prompt pass over every eligible item.
///
/// Each item is attempted at most once per pass. Items being processed by
/// the generation pool are left alone.
pub async fn run_prompt_pass(
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) -> WorkerResult<PromptSummary> {
    let key_count = ctx.keys.len();
    if key_count == 0 {
        let message = "No API keys configured.";
        ctx.activity.error(message);
        ctx.activity.set_status(message);
        return Err(WorkerError::config_error(message));
    }

    ctx.queue.reset_prompt_claims().await;
    let eligible = ctx
        .queue
        .count_where(|item| item.is_eligible() && item.status() != ItemStatus::Processing)
        .await;
    if eligible == 0 {
        let err = WorkerError::validation("No items to process.");
        ctx.activity.set_status(err.to_string());
        return Err(err);
    }

    let worker_count = ctx.config.worker_count(key_count, eligible);
    ctx.activity.set_status(format!(
        "Generating prompts for {} item(s) with {} worker(s)...",
        eligible, worker_count
    ));

    let mut workers = JoinSet::new();
    for worker in 0..worker_count {
        let ctx = Arc::clone(&ctx);
        let cancel = cancel.clone();
        workers.spawn(async move { prompt_worker(ctx, worker, cancel).await });
    }
    let spawned = workers.len();

    let mut generated = 0;
    let mut failed = 0;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((ok, err)) => {
                generated += ok;
                failed += err;
            }
            Err(e) => error!("Prompt worker terminated abnormally: {}", e),
        }
    }
    ctx.queue.reset_prompt_claims().await;

    let outcome = if cancel.is_cancelled() {
        RunOutcome::Cancelled
    } else {
        RunOutcome::Completed
    };
    let summary = PromptSummary {
        outcome,
        workers: spawned,
        generated,
        failed,
    };

    let message = summary.status_message();
    if outcome == RunOutcome::Completed && failed == 0 {
        ctx.activity.success(message.clone());
    } else {
        ctx.activity.warning(message.clone());
    }
    ctx.activity.set_status(message);
    metrics::record_pool_run(PoolKind::Prompt, outcome.as_str());

    info!(
        outcome = outcome.as_str(),
        workers = spawned,
        generated,
        failed,
        "Prompt pass finished"
    );
    Ok(summary)
}

async fn prompt_worker(ctx: Arc<WorkerContext>, worker: usize, cancel: CancellationToken) -> (usize, usize) {
    let mut generated = 0;
    let mut failed = 0;

    while !cancel.is_cancelled() {
        let Some(item) = ctx.queue.claim_for_prompt().await else {
            break;
        };
        // Keys are taken per item, unlike generation workers.
        let Some(credential) = ctx.keys.next_key() else {
            break;
        };

        let logger = ItemLogger::new(&item.id, PoolKind::Prompt, worker);
        logger.log_start(&item.label());

        let result = run_prompt_generation(
            &ctx.queue,
            ctx.backend.as_ref(),
            &item.id,
            &credential,
            Some(&cancel),
        )
        .instrument(logger.create_span())
        .await;

        match result {
            Ok(prompt) => {
                generated += 1;
                logger.log_completion(&prompt);
                ctx.activity.success(format!("Prompt ready for {}", item.label()));
                metrics::record_item_completed(PoolKind::Prompt);
            }
            Err(e) if e.is_cancelled() => break,
            // Removed or claimed for generation since the pass claimed it.
            Err(WorkerError::Queue(e)) => logger.log_warning(&e.to_string()),
            Err(WorkerError::Validation(msg)) => logger.log_warning(&msg),
            Err(e) => {
                failed += 1;
                let message = e.to_string();
                logger.log_error(&message);
                let credential_error = is_credential_message(&message);
                if credential_error {
                    ctx.activity.raise_notice();
                }
                ctx.activity
                    .error(format!("Failed to generate prompt for {}: {}", item.label(), message));
                metrics::record_item_failed(PoolKind::Prompt, credential_error);
            }
        }
    }

    (generated, failed)
}
