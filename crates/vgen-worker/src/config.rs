//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on concurrent workers per pool.
pub const MAX_WORKERS: usize = 5;

/// Prompt used for image items that have no prompt of their own.
pub const FALLBACK_PROMPT: &str = "Animate this image, bringing it to life.";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent workers per pool
    pub max_workers: usize,
    /// Delay between polls of a running video operation
    pub poll_interval: Duration,
    /// Give up on a video operation after this long
    pub poll_timeout: Duration,
    /// Prompt for image items without a prompt
    pub fallback_prompt: String,
    /// Maximum entries kept in the activity log
    pub activity_log_cap: usize,
    /// File holding API keys, one per line
    pub keys_file: PathBuf,
    /// Directory scanned for images by the session driver
    pub input_dir: Option<PathBuf>,
    /// File with one prompt per line for prompt-only items
    pub prompts_file: Option<PathBuf>,
    /// Where results and the archive are written
    pub output_dir: PathBuf,
    /// Run the prompt pass before generating videos
    pub generate_prompts: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            poll_interval: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(20 * 60),
            fallback_prompt: FALLBACK_PROMPT.to_string(),
            activity_log_cap: 500,
            keys_file: PathBuf::from("api_keys.txt"),
            input_dir: None,
            prompts_file: None,
            output_dir: PathBuf::from("output"),
            generate_prompts: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_workers: std::env::var("VGEN_MAX_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_WORKERS)
                .max(1),
            poll_interval: Duration::from_secs(
                std::env::var("VGEN_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            poll_timeout: Duration::from_secs(
                std::env::var("VGEN_POLL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20 * 60),
            ),
            fallback_prompt: std::env::var("VGEN_FALLBACK_PROMPT")
                .unwrap_or_else(|_| FALLBACK_PROMPT.to_string()),
            activity_log_cap: std::env::var("VGEN_ACTIVITY_LOG_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
            keys_file: std::env::var("VGEN_KEYS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("api_keys.txt")),
            input_dir: std::env::var("VGEN_INPUT_DIR").ok().map(PathBuf::from),
            prompts_file: std::env::var("VGEN_PROMPTS_FILE").ok().map(PathBuf::from),
            output_dir: std::env::var("VGEN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            generate_prompts: std::env::var("VGEN_GENERATE_PROMPTS")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Number of workers for a pool run.
    ///
    /// Bounded by the number of keys, the number of eligible items and
    /// `max_workers`.
    pub fn worker_count(&self, keys: usize, eligible: usize) -> usize {
        keys.min(eligible).min(self.max_workers.max(1))
    }
}
