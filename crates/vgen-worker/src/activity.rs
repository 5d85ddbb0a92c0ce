//! Activity log, rolling status line and standing notice.
//!
//! Everything user-visible goes through here: a bounded chronological log
//! of [`ActivityEntry`], one status line that each pool overwrites, and
//! the quota/domain notice raised by key-related failures.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use vgen_models::{ActivityEntry, ActivityLevel};

/// Notice shown after a key, quota or domain restriction failure.
pub const QUOTA_NOTICE: &str = "An API key was rejected or hit its quota. Check that your keys \
are valid, that billing is enabled, and that any HTTP referrer restrictions allow this origin.";

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<ActivityEntry>,
    status: String,
    notice: Option<String>,
}

/// Shared activity log.
#[derive(Debug)]
pub struct ActivityLog {
    state: Mutex<LogState>,
    cap: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(500)
    }
}

impl ActivityLog {
    pub fn new(cap: usize) -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            cap: cap.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry, dropping the oldest one past the cap.
    pub fn push(&self, entry: ActivityEntry) {
        match entry.level {
            ActivityLevel::Error => error!(activity = true, "{}", entry.message),
            ActivityLevel::Warning => warn!(activity = true, "{}", entry.message),
            ActivityLevel::Info | ActivityLevel::Success => info!(activity = true, "{}", entry.message),
        }

        let mut state = self.lock();
        if state.entries.len() >= self.cap {
            state.entries.pop_front();
        }
        state.entries.push_back(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(ActivityEntry::info(message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(ActivityEntry::success(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(ActivityEntry::warning(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(ActivityEntry::error(message));
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Overwrite the status line.
    pub fn set_status(&self, status: impl Into<String>) {
        self.lock().status = status.into();
    }

    pub fn status(&self) -> String {
        self.lock().status.clone()
    }

    /// Show the standing quota/domain notice.
    pub fn raise_notice(&self) {
        let mut state = self.lock();
        if state.notice.is_none() {
            state.notice = Some(QUOTA_NOTICE.to_string());
            drop(state);
            warn!("Raised API key / quota notice");
        }
    }

    pub fn clear_notice(&self) {
        self.lock().notice = None;
    }

    pub fn notice(&self) -> Option<String> {
        self.lock().notice.clone()
    }
}
