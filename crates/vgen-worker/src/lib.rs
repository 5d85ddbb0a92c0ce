//! Batch video generation worker.
//!
//! This crate provides:
//! - The generation pool: bounded workers with one API key each
//! - The prompt pool and the single-item prompt action
//! - Cooperative cancellation with re-queueing of in-flight items
//! - Result collection and zip export
//! - The `Studio` session facade used by the binary

pub mod activity;
pub mod cancel;
pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod prompt;
pub mod studio;

pub use activity::{ActivityLog, QUOTA_NOTICE};
pub use cancel::{PoolController, PoolKind, PoolRun};
pub use collector::{CollectedResult, ResultCollector};
pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use error::{WorkerError, WorkerResult};
pub use generation::{generate_video, run_generation, GenerationSummary, RunOutcome};
pub use keys::{KeyRotator, KeyStore};
pub use logging::ItemLogger;
pub use prompt::{generate_prompt, run_prompt_pass, PromptSummary};
pub use studio::Studio;
