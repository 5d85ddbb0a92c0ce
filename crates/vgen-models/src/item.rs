//! Work item definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::media::{ImageData, VideoArtifact};
use crate::status::{ItemState, ItemStatus};

/// Unique identifier for a work item.
///
/// Backed by a UUIDv7, so ids generated later sort later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Generate a new time-ordered item ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One queued unit of work: an image, a prompt, or both.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Unique item ID
    pub id: ItemId,

    /// Optional input image
    pub image: Option<ImageData>,

    /// Optional text prompt
    pub prompt: Option<String>,

    /// Lifecycle state
    pub state: ItemState,

    /// Claim marker for the current prompt-generation pass
    pub prompt_pass_claimed: bool,

    /// Claim marker for the current generation run. An item is attempted
    /// at most once per run; failures wait for the next run.
    pub generation_run_claimed: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    /// Create an item. Its state is derived from its content.
    pub fn new(image: Option<ImageData>, prompt: Option<String>) -> Self {
        let mut item = Self {
            id: ItemId::new(),
            image,
            prompt,
            state: ItemState::Queued,
            prompt_pass_claimed: false,
            generation_run_claimed: false,
            created_at: Utc::now(),
        };
        item.state = item.initial_state();
        item
    }

    /// Create an item from an image, with an optional prompt.
    pub fn from_image(image: ImageData, prompt: Option<String>) -> Self {
        Self::new(Some(image), prompt)
    }

    /// Create a prompt-only item.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(None, Some(prompt.into()))
    }

    pub fn status(&self) -> ItemStatus {
        self.state.status()
    }

    /// Last error message, present only in the `error` status.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ItemState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Generated video, present only in the `complete` status.
    pub fn artifact(&self) -> Option<&VideoArtifact> {
        match &self.state {
            ItemState::Complete { artifact } => Some(artifact),
            _ => None,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// True when the prompt has non-whitespace content.
    pub fn has_prompt(&self) -> bool {
        self.prompt
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false)
    }

    /// An item is eligible for work when it has an image or a prompt.
    pub fn is_eligible(&self) -> bool {
        self.has_image() || self.has_prompt()
    }

    /// Prompt sent to the video model.
    ///
    /// The trimmed prompt if present, otherwise `fallback` when an image is
    /// attached. `None` for items with neither.
    pub fn effective_prompt(&self, fallback: &str) -> Option<String> {
        if self.has_prompt() {
            return self.prompt.as_deref().map(|p| p.trim().to_string());
        }
        if self.has_image() {
            return Some(fallback.to_string());
        }
        None
    }

    /// State a fresh item gets from its content.
    pub fn initial_state(&self) -> ItemState {
        if self.is_eligible() {
            ItemState::Queued
        } else {
            ItemState::Skipped
        }
    }

    /// Re-derive `queued`/`skipped` after the content changed.
    ///
    /// Only touches items that are idle (queued, skipped or error); an
    /// error item that lost its content becomes skipped.
    pub fn refresh_eligibility(&mut self) {
        match (self.status(), self.is_eligible()) {
            (ItemStatus::Skipped, true) => self.state = ItemState::Queued,
            (ItemStatus::Queued | ItemStatus::Error, false) => self.state = ItemState::Skipped,
            _ => {}
        }
    }

    /// Human label used in logs and archive names.
    pub fn label(&self) -> String {
        match self.image.as_ref().and_then(|i| i.file_name()) {
            Some(name) => name.to_string(),
            None => match self.prompt.as_deref() {
                Some(p) if !p.trim().is_empty() => {
                    let p = p.trim();
                    match p.char_indices().nth(40) {
                        Some((idx, _)) => format!("{}...", &p[..idx]),
                        None => p.to_string(),
                    }
                }
                _ => self.id.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageData {
        ImageData::from_file(vec![1u8, 2, 3], "sunset.jpg").unwrap()
    }

    #[test]
    fn test_item_ids_are_distinct_and_ordered() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_new_item_status_from_content() {
        assert_eq!(WorkItem::from_image(image(), None).status(), ItemStatus::Queued);
        assert_eq!(WorkItem::from_prompt("a cat").status(), ItemStatus::Queued);
        assert_eq!(WorkItem::from_prompt("   ").status(), ItemStatus::Skipped);
        assert_eq!(WorkItem::new(None, None).status(), ItemStatus::Skipped);
    }

    #[test]
    fn test_effective_prompt() {
        let fallback = "Animate this image, bringing it to life.";

        let item = WorkItem::from_image(image(), Some("  waves crash  ".into()));
        assert_eq!(item.effective_prompt(fallback).as_deref(), Some("waves crash"));

        let item = WorkItem::from_image(image(), Some(" ".into()));
        assert_eq!(item.effective_prompt(fallback).as_deref(), Some(fallback));

        let item = WorkItem::new(None, None);
        assert_eq!(item.effective_prompt(fallback), None);
    }

    #[test]
    fn test_error_and_artifact_follow_state() {
        let mut item = WorkItem::from_prompt("a cat");
        assert!(item.error().is_none());
        assert!(item.artifact().is_none());

        item.state = ItemState::error("boom");
        assert_eq!(item.error(), Some("boom"));
        assert!(item.artifact().is_none());

        item.state = ItemState::complete(VideoArtifact::new(vec![9u8]));
        assert!(item.error().is_none());
        assert!(item.artifact().is_some());
    }

    #[test]
    fn test_refresh_eligibility() {
        let mut item = WorkItem::new(None, None);
        item.prompt = Some("a dog".into());
        item.refresh_eligibility();
        assert_eq!(item.status(), ItemStatus::Queued);

        item.prompt = None;
        item.refresh_eligibility();
        assert_eq!(item.status(), ItemStatus::Skipped);
    }

    #[test]
    fn test_label() {
        assert_eq!(WorkItem::from_image(image(), None).label(), "sunset.jpg");
        let long = "a".repeat(60);
        assert_eq!(WorkItem::from_prompt(long).label().len(), 43);
    }
}
