//! Insertion-ordered work item queue.
//!
//! The queue is shared by both worker pools and by direct user edits.
//! Workers run as tokio tasks on a multi-threaded runtime, so every
//! scan-and-mark happens inside a single critical section: two workers can
//! never claim the same item.

use tokio::sync::Mutex;
use tracing::{debug, info};

use vgen_models::{ImageData, ItemId, ItemState, ItemStatus, WorkItem};

use crate::error::{QueueError, QueueResult};

/// Work item queue.
#[derive(Debug, Default)]
pub struct JobQueue {
    items: Mutex<Vec<WorkItem>>,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item.
    ///
    /// The item's state is derived from its content: `queued` when it has
    /// an image or a non-blank prompt, `skipped` otherwise.
    pub async fn add(&self, mut item: WorkItem) -> QueueResult<ItemId> {
        let mut items = self.items.lock().await;
        if items.iter().any(|i| i.id == item.id) {
            return Err(QueueError::DuplicateItem(item.id));
        }

        item.state = item.initial_state();
        item.prompt_pass_claimed = false;
        item.generation_run_claimed = false;
        let id = item.id.clone();

        debug!(item_id = %id, status = %item.status(), "Added item to queue");
        items.push(item);
        Ok(id)
    }

    /// Append an image item (file add).
    pub async fn add_image(&self, image: ImageData, prompt: Option<String>) -> QueueResult<ItemId> {
        self.add(WorkItem::from_image(image, prompt)).await
    }

    /// Append a prompt-only item.
    pub async fn add_prompt(&self, prompt: impl Into<String>) -> QueueResult<ItemId> {
        self.add(WorkItem::from_prompt(prompt)).await
    }

    /// Claim the first item matching `predicate`, in insertion order.
    ///
    /// `claim` marks the item (status change or claim marker) while the
    /// queue is still locked. Returns a snapshot of the claimed item.
    pub async fn claim_next<P, C>(&self, predicate: P, claim: C) -> Option<WorkItem>
    where
        P: Fn(&WorkItem) -> bool,
        C: FnOnce(&mut WorkItem),
    {
        let mut items = self.items.lock().await;
        let item = items.iter_mut().find(|i| predicate(&**i))?;
        claim(item);
        Some(item.clone())
    }

    /// Claim the next item for video generation and mark it `processing`.
    ///
    /// `queued` and `error` items are claimable, each once per run: an item
    /// that fails is retried by the next run, not by the current one.
    pub async fn claim_for_generation(&self) -> Option<WorkItem> {
        self.claim_next(
            |item| {
                item.status().is_generation_claimable()
                    && item.is_eligible()
                    && !item.generation_run_claimed
            },
            |item| {
                item.state = ItemState::Processing;
                item.generation_run_claimed = true;
            },
        )
        .await
    }

    /// Claim the next item for the current prompt pass.
    ///
    /// The claim is the per-pass marker; the status is left untouched.
    pub async fn claim_for_prompt(&self) -> Option<WorkItem> {
        self.claim_next(
            |item| {
                item.is_eligible()
                    && !item.prompt_pass_claimed
                    && item.status() != ItemStatus::Processing
            },
            |item| item.prompt_pass_claimed = true,
        )
        .await
    }

    /// Remove an item, dropping its image payload.
    pub async fn remove(&self, id: &ItemId) -> QueueResult<WorkItem> {
        let mut items = self.items.lock().await;
        let idx = items
            .iter()
            .position(|i| &i.id == id)
            .ok_or_else(|| QueueError::not_found(id))?;

        if items[idx].status() == ItemStatus::Processing {
            return Err(QueueError::busy(id));
        }

        let item = items.remove(idx);
        debug!(item_id = %id, "Removed item from queue");
        Ok(item)
    }

    /// Remove every `complete` item. Returns the removed ids.
    pub async fn clear_completed(&self) -> Vec<ItemId> {
        let mut items = self.items.lock().await;
        let mut removed = Vec::new();
        items.retain(|item| {
            if item.status() == ItemStatus::Complete {
                removed.push(item.id.clone());
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            info!("Cleared {} completed items", removed.len());
        }
        removed
    }

    /// Remove every item.
    pub async fn clear(&self) {
        self.items.lock().await.clear();
    }

    pub async fn get(&self, id: &ItemId) -> Option<WorkItem> {
        self.items.lock().await.iter().find(|i| &i.id == id).cloned()
    }

    /// Copy of every item, in insertion order.
    pub async fn snapshot(&self) -> Vec<WorkItem> {
        self.items.lock().await.clone()
    }

    /// Completed items, in insertion order.
    pub async fn completed(&self) -> Vec<WorkItem> {
        self.items
            .lock()
            .await
            .iter()
            .filter(|i| i.status() == ItemStatus::Complete)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Number of items in `status`.
    pub async fn count(&self, status: ItemStatus) -> usize {
        self.count_where(|i| i.status() == status).await
    }

    pub async fn count_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&WorkItem) -> bool,
    {
        self.items.lock().await.iter().filter(|i| predicate(*i)).count()
    }

    /// Apply `f` to one item under the queue lock.
    pub async fn update<F, R>(&self, id: &ItemId, f: F) -> QueueResult<R>
    where
        F: FnOnce(&mut WorkItem) -> R,
    {
        let mut items = self.items.lock().await;
        let item = items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| QueueError::not_found(id))?;
        Ok(f(item))
    }

    /// User edit of an item's prompt.
    ///
    /// Rejected while the item is being processed.
    pub async fn set_prompt(&self, id: &ItemId, prompt: Option<String>) -> QueueResult<()> {
        self.edit(id, |item| item.prompt = prompt).await
    }

    /// Replace or remove an item's image.
    ///
    /// Rejected while the item is being processed.
    pub async fn set_image(&self, id: &ItemId, image: Option<ImageData>) -> QueueResult<()> {
        self.edit(id, |item| item.image = image).await
    }

    async fn edit<F>(&self, id: &ItemId, f: F) -> QueueResult<()>
    where
        F: FnOnce(&mut WorkItem),
    {
        let mut items = self.items.lock().await;
        let item = items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| QueueError::not_found(id))?;

        if item.status() == ItemStatus::Processing {
            return Err(QueueError::busy(id));
        }

        f(item);
        item.refresh_eligibility();
        Ok(())
    }

    /// Put every `processing` item back to `queued`.
    ///
    /// Called after a cancelled generation run has joined its workers.
    pub async fn requeue_processing(&self) -> usize {
        let mut items = self.items.lock().await;
        let mut requeued = 0;
        for item in items.iter_mut() {
            if item.status() == ItemStatus::Processing {
                item.state = ItemState::Queued;
                requeued += 1;
            }
        }

        if requeued > 0 {
            info!("Re-queued {} in-flight items", requeued);
        }
        requeued
    }

    /// Clear the generation-run claim marker on every item.
    pub async fn reset_generation_claims(&self) {
        for item in self.items.lock().await.iter_mut() {
            item.generation_run_claimed = false;
        }
    }

    /// Clear the prompt-pass claim marker on every item.
    pub async fn reset_prompt_claims(&self) {
        for item in self.items.lock().await.iter_mut() {
            item.prompt_pass_claimed = false;
        }
    }
}
