//! Device system log.
//!
//! A bounded in-memory log the device keeps for the dashboard's
//! System / Log view. Entries are served newest first through
//! `/api/get_log?pos=<offset>&nmr=<count>`.
//!
//! ```json
//! { "logs": [{ "level": "info", "message": "...", "timestamp": "..." }], "total": 42 }
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Entries kept before the oldest are dropped.
pub const DEFAULT_LOG_CAPACITY: usize = 256;

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,

    /// Log message.
    pub message: String,

    /// ISO 8601 timestamp.
    pub timestamp: String,
}

/// A page of log entries, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub logs: Vec<LogEntry>,
    pub total: usize,
}

/// Bounded ring of log entries.
#[derive(Debug, Clone)]
pub struct DeviceLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl DeviceLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry stamped with the current time.
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        let timestamp =
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.push_entry(LogEntry {
            level,
            message: message.into(),
            timestamp,
        });
    }

    /// Append a prepared entry.
    pub fn push_entry(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `count` entries, skipping the `offset` newest.
    pub fn page(&self, offset: usize, count: usize) -> LogPage {
        LogPage {
            logs: self
                .entries
                .iter()
                .rev()
                .skip(offset)
                .take(count)
                .cloned()
                .collect(),
            total: self.entries.len(),
        }
    }
}

impl Default for DeviceLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
