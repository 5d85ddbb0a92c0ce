//! API key rotation and storage.
//!
//! One [`KeyRotator`] is shared by every worker of both pools and by the
//! interactive prompt action, so rotation order is a single process-wide
//! sequence.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::WorkerResult;

#[derive(Debug, Default)]
struct RotatorState {
    keys: Vec<String>,
    cursor: usize,
}

/// Round-robin dispenser of API keys.
#[derive(Debug, Default)]
pub struct KeyRotator {
    state: Mutex<RotatorState>,
}

impl KeyRotator {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            state: Mutex::new(RotatorState { keys, cursor: 0 }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RotatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next key in rotation, or `None` when no keys are configured.
    pub fn next_key(&self) -> Option<String> {
        let mut state = self.lock();
        if state.keys.is_empty() {
            return None;
        }
        let idx = state.cursor % state.keys.len();
        state.cursor = (idx + 1) % state.keys.len();
        Some(state.keys[idx].clone())
    }

    /// Replace the key list.
    ///
    /// The cursor is kept; it is taken modulo the new length on the next
    /// call.
    pub fn reload(&self, keys: Vec<String>) {
        let mut state = self.lock();
        info!("Loaded {} API keys", keys.len());
        state.keys = keys;
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().keys.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys.clone()
    }
}

/// Parse a multi-line key list: one key per line, blanks ignored.
pub fn parse_keys(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// File-backed key store.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored keys. A missing file means no keys are configured.
    pub async fn load(&self) -> WorkerResult<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                let keys = parse_keys(&text);
                debug!(path = %self.path.display(), count = keys.len(), "Read key store");
                Ok(keys)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the stored keys.
    pub async fn save(&self, keys: &[String]) -> WorkerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut text = keys.join("\n");
        text.push('\n');
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}
