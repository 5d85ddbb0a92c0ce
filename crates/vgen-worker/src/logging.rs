//! Structured item logging utilities.
//!
//! Provides consistent, structured logging for work items as they move
//! through a pool, with tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use vgen_models::ItemId;

use crate::cancel::PoolKind;

/// Item logger for structured logging with consistent formatting.
///
/// Every line carries the item ID, the pool and the worker index.
#[derive(Debug, Clone)]
pub struct ItemLogger {
    item_id: String,
    pool: PoolKind,
    worker: usize,
}

impl ItemLogger {
    /// Create a new item logger for an item handled by `worker` of `pool`.
    pub fn new(item_id: &ItemId, pool: PoolKind, worker: usize) -> Self {
        Self {
            item_id: item_id.to_string(),
            pool,
            worker,
        }
    }

    /// Log that a worker claimed the item.
    pub fn log_start(&self, message: &str) {
        info!(
            item_id = %self.item_id,
            pool = %self.pool,
            worker = self.worker,
            "Item started: {}", message
        );
    }

    /// Log a progress update while the item is in flight.
    pub fn log_progress(&self, message: &str) {
        info!(
            item_id = %self.item_id,
            pool = %self.pool,
            worker = self.worker,
            "Item progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            item_id = %self.item_id,
            pool = %self.pool,
            worker = self.worker,
            "Item warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            item_id = %self.item_id,
            pool = %self.pool,
            worker = self.worker,
            "Item error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            item_id = %self.item_id,
            pool = %self.pool,
            worker = self.worker,
            "Item completed: {}", message
        );
    }

    /// Create a tracing span for this item.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "item",
            item_id = %self.item_id,
            pool = %self.pool,
            worker = self.worker
        )
    }
}
