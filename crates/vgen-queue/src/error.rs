//! Queue error types.

use thiserror::Error;

use vgen_models::{ItemId, MediaError};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Duplicate item: {0}")]
    DuplicateItem(ItemId),

    #[error("Item is being processed: {0}")]
    ItemBusy(ItemId),

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] MediaError),
}

impl QueueError {
    pub fn not_found(id: &ItemId) -> Self {
        Self::ItemNotFound(id.clone())
    }

    pub fn busy(id: &ItemId) -> Self {
        Self::ItemBusy(id.clone())
    }
}
