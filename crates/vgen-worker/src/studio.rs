//! Session facade.
//!
//! A [`Studio`] owns the queue, the key rotation, the collector and the
//! activity log for one session, and exposes the user-level actions:
//! adding and editing items, starting and cancelling the pools, and
//! exporting results.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use vgen_client::VideoBackend;
use vgen_models::{ImageData, ItemId, WorkItem};
use vgen_queue::QueueError;

use crate::activity::ActivityLog;
use crate::cancel::{PoolController, PoolKind};
use crate::collector::ResultCollector;
use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::generation::{run_generation, GenerationSummary};
use crate::keys::{KeyRotator, KeyStore};
use crate::prompt::{self, run_prompt_pass, PromptSummary};

pub struct Studio {
    ctx: Arc<WorkerContext>,
    controller: PoolController,
}

impl Studio {
    pub fn new(config: WorkerConfig, backend: Arc<dyn VideoBackend>, keys: Vec<String>) -> Self {
        Self::with_context(WorkerContext::new(config, backend, keys))
    }

    pub fn with_context(ctx: WorkerContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            controller: PoolController::new(),
        }
    }

    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.ctx
    }

    pub fn queue(&self) -> &vgen_queue::JobQueue {
        &self.ctx.queue
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.ctx.activity
    }

    pub fn collector(&self) -> &ResultCollector {
        &self.ctx.collector
    }

    pub fn keys(&self) -> &KeyRotator {
        &self.ctx.keys
    }

    pub fn controller(&self) -> &PoolController {
        &self.controller
    }

    pub async fn add_image(&self, image: ImageData, prompt: Option<String>) -> WorkerResult<ItemId> {
        let id = self.ctx.queue.add_image(image, prompt).await?;
        Ok(id)
    }

    /// Read an image from disk and queue it.
    pub async fn add_image_file(&self, path: &Path, prompt: Option<String>) -> WorkerResult<ItemId> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let image = ImageData::from_file(bytes, &file_name).map_err(QueueError::from)?;
        self.add_image(image, prompt).await
    }

    pub async fn add_prompt(&self, prompt: impl Into<String>) -> WorkerResult<ItemId> {
        let id = self.ctx.queue.add_prompt(prompt).await?;
        Ok(id)
    }

    /// Remove an item and any collected result for it.
    pub async fn remove(&self, id: &ItemId) -> WorkerResult<WorkItem> {
        let item = self.ctx.queue.remove(id).await?;
        self.ctx.collector.clear_completed(std::slice::from_ref(id));
        Ok(item)
    }

    pub async fn set_prompt(&self, id: &ItemId, prompt: Option<String>) -> WorkerResult<()> {
        self.ctx.queue.set_prompt(id, prompt).await?;
        Ok(())
    }

    pub async fn set_image(&self, id: &ItemId, image: Option<ImageData>) -> WorkerResult<()> {
        self.ctx.queue.set_image(id, image).await?;
        Ok(())
    }

    /// Run the generation pool to completion or cancellation.
    pub async fn generate_all(&self) -> WorkerResult<GenerationSummary> {
        let run = self.controller.begin(PoolKind::Generation)?;
        run_generation(Arc::clone(&self.ctx), run.token()).await
    }

    /// Run a prompt pass over all eligible items.
    pub async fn generate_prompts(&self) -> WorkerResult<PromptSummary> {
        let run = self.controller.begin(PoolKind::Prompt)?;
        run_prompt_pass(Arc::clone(&self.ctx), run.token()).await
    }

    /// Generate a prompt for a single item with the next key in rotation.
    ///
    /// The item is validated before a key is drawn, so a rejected request
    /// leaves the rotation where it was.
    pub async fn generate_prompt_for(&self, id: &ItemId) -> WorkerResult<String> {
        let item = self
            .ctx
            .queue
            .get(id)
            .await
            .ok_or_else(|| QueueError::not_found(id))?;
        if !item.is_eligible() {
            self.ctx.activity.error(prompt::MISSING_INPUT_MESSAGE);
            return Err(WorkerError::validation(prompt::MISSING_INPUT_MESSAGE));
        }

        let credential = self.ctx.keys.next_key().ok_or_else(|| {
            let message = "No API keys configured.";
            self.ctx.activity.error(message);
            self.ctx.activity.set_status(message);
            WorkerError::config_error(message)
        })?;

        match prompt::generate_prompt(&self.ctx.queue, self.ctx.backend.as_ref(), id, &credential).await {
            Ok(text) => {
                self.ctx.activity.success("Prompt generated.");
                Ok(text)
            }
            Err(e) => {
                if e.is_credential_error() {
                    self.ctx.activity.raise_notice();
                }
                self.ctx.activity.error(e.to_string());
                if matches!(e, WorkerError::PromptFailed(_)) {
                    self.ctx.activity.set_status(prompt::PROMPT_FAILED_MESSAGE);
                }
                Err(e)
            }
        }
    }

    /// Ask the generation pool to stop. Returns `false` if it is idle.
    pub fn cancel_generation(&self) -> bool {
        self.controller.cancel(PoolKind::Generation)
    }

    /// Ask the prompt pool to stop. Returns `false` if it is idle.
    pub fn cancel_prompts(&self) -> bool {
        self.controller.cancel(PoolKind::Prompt)
    }

    pub fn is_generating(&self) -> bool {
        self.controller.is_active(PoolKind::Generation)
    }

    pub fn is_generating_prompts(&self) -> bool {
        self.controller.is_active(PoolKind::Prompt)
    }

    /// Remove every completed item and its collected result.
    pub async fn clear_completed(&self) -> Vec<ItemId> {
        let removed = self.ctx.queue.clear_completed().await;
        self.ctx.collector.clear_completed(&removed);
        if !removed.is_empty() {
            self.ctx
                .activity
                .info(format!("Cleared {} completed item(s)", removed.len()));
        }
        removed
    }

    /// Write every completed video into one zip at `path`.
    pub async fn download_all(&self, path: &Path) -> WorkerResult<usize> {
        let items = self.ctx.queue.snapshot().await;
        match self.ctx.collector.write_archive(&items, path).await {
            Ok(count) => {
                self.ctx
                    .activity
                    .success(format!("Archived {} video(s) to {}", count, path.display()));
                Ok(count)
            }
            Err(e) => {
                self.ctx.activity.error(format!("Download failed: {}", e));
                Err(e)
            }
        }
    }

    /// Replace the key rotation with the store's contents.
    pub async fn reload_keys(&self, store: &KeyStore) -> WorkerResult<usize> {
        let keys = store.load().await?;
        let count = keys.len();
        self.ctx.keys.reload(keys);
        info!(path = %store.path().display(), count, "Reloaded API keys");
        Ok(count)
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("ctx", &self.ctx)
            .field("controller", &self.controller)
            .finish()
    }
}
