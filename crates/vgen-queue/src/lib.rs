//! In-memory work item queue.
//!
//! This crate provides:
//! - Insertion-ordered storage of work items, unique by id
//! - Atomic claim-and-mark for concurrent workers
//! - The status rules for user edits, removal and re-queueing

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::JobQueue;
