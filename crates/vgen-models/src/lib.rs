//! Shared data models for the vgen video generation queue.
//!
//! This crate provides:
//! - Work items and their identifiers
//! - The item lifecycle (`ItemState` / `ItemStatus`)
//! - Image and video payloads
//! - Activity log entries

pub mod activity;
pub mod item;
pub mod media;
pub mod status;

// Re-export common types
pub use activity::{ActivityEntry, ActivityLevel};
pub use item::{ItemId, WorkItem};
pub use media::{ImageData, MediaError, VideoArtifact, DEFAULT_VIDEO_MIME};
pub use status::{ItemState, ItemStatus};
