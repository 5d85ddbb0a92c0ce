//! Worker error types.

use thiserror::Error;

use crate::cancel::PoolKind;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Substrings that mark a failure as a key, quota or domain restriction
/// problem. Matched case-insensitively against the error message.
pub const CREDENTIAL_ERROR_MARKERS: [&str; 4] = ["api key not valid", "429", "permission", "referrer"];

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    Validation(String),

    #[error("The {0} pool is already running")]
    PoolBusy(PoolKind),

    #[error("Cancelled")]
    Cancelled,

    #[error("Video generation failed: {0}")]
    GenerationFailed(String),

    #[error("Prompt generation failed: {0}")]
    PromptFailed(String),

    #[error("No completed videos to download")]
    NothingToDownload,

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Client error: {0}")]
    Client(#[from] vgen_client::ClientError),

    #[error("Queue error: {0}")]
    Queue(#[from] vgen_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    /// Check if the error is a cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }

    /// Check if the error was raised before any work started.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::ConfigError(_) | WorkerError::Validation(_) | WorkerError::PoolBusy(_)
        )
    }

    /// Check if the error points at the API key, quota or domain restrictions.
    pub fn is_credential_error(&self) -> bool {
        is_credential_message(&self.to_string())
    }
}

/// Check an error message for key, quota or domain restriction signals.
pub fn is_credential_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    CREDENTIAL_ERROR_MARKERS.iter().any(|marker| msg.contains(marker))
}

impl From<zip::result::ZipError> for WorkerError {
    fn from(e: zip::result::ZipError) -> Self {
        WorkerError::Archive(e.to_string())
    }
}
