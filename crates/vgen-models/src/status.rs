//! Work item lifecycle.
//!
//! [`ItemState`] carries only the data valid for each state: an error
//! message exists only on `Error`, an artifact only on `Complete`.
//! [`ItemStatus`] is its field-less projection, used for display, counting
//! and claim predicates.

use serde::{Deserialize, Serialize};

use crate::media::VideoArtifact;

/// Display status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    /// Waiting for a generation worker
    #[default]
    Queued,
    /// Claimed by a generation worker
    Processing,
    /// A prompt is being written for the item
    GeneratingPrompt,
    /// Video generated
    Complete,
    /// Last attempt failed; retryable
    Error,
    /// Nothing to generate from (no image, no prompt)
    Skipped,
}

impl ItemStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::GeneratingPrompt => "generating-prompt",
            ItemStatus::Complete => "complete",
            ItemStatus::Error => "error",
            ItemStatus::Skipped => "skipped",
        }
    }

    /// Statuses a generation worker may claim.
    pub fn is_generation_claimable(&self) -> bool {
        matches!(self, ItemStatus::Queued | ItemStatus::Error)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full state of a work item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemState {
    #[default]
    Queued,
    Processing,
    /// Prompt generation in flight; `prior` is restored on success.
    GeneratingPrompt { prior: Box<ItemState> },
    Complete { artifact: VideoArtifact },
    Error { message: String },
    Skipped,
}

impl ItemState {
    pub fn status(&self) -> ItemStatus {
        match self {
            ItemState::Queued => ItemStatus::Queued,
            ItemState::Processing => ItemStatus::Processing,
            ItemState::GeneratingPrompt { .. } => ItemStatus::GeneratingPrompt,
            ItemState::Complete { .. } => ItemStatus::Complete,
            ItemState::Error { .. } => ItemStatus::Error,
            ItemState::Skipped => ItemStatus::Skipped,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ItemState::Error {
            message: message.into(),
        }
    }

    pub fn complete(artifact: VideoArtifact) -> Self {
        ItemState::Complete { artifact }
    }

    /// Enter prompt generation, remembering the current state.
    pub fn begin_prompt_generation(&mut self) {
        let prior = std::mem::take(self);
        *self = ItemState::GeneratingPrompt {
            prior: Box::new(prior),
        };
    }

    /// Leave prompt generation successfully.
    ///
    /// Restores the remembered state. A remembered `GeneratingPrompt` is
    /// stale and restores to `Queued`.
    pub fn finish_prompt_generation(&mut self) {
        let current = std::mem::take(self);
        *self = match current {
            ItemState::GeneratingPrompt { prior } => match *prior {
                ItemState::GeneratingPrompt { .. } => ItemState::Queued,
                other => other,
            },
            other => other,
        };
    }
}
