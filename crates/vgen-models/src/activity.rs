//! Activity log entries.
//!
//! Every user-visible event (item claimed, failed, completed, pool
//! finished) becomes one timestamped entry in a chronological log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Info => "info",
            ActivityLevel::Success => "success",
            ActivityLevel::Warning => "warning",
            ActivityLevel::Error => "error",
        }
    }
}

/// A single activity log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub level: ActivityLevel,
    pub message: String,
}

impl ActivityEntry {
    pub fn new(level: ActivityLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ActivityLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ActivityLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ActivityLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ActivityLevel::Error, message)
    }
}

impl std::fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level.as_str(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization() {
        let entry = ActivityEntry::warning("Quota exceeded");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "Quota exceeded");
    }

    #[test]
    fn test_entry_display() {
        let entry = ActivityEntry::error("boom");
        assert!(entry.to_string().ends_with("error: boom"));
    }
}
