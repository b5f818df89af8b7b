//! User-facing notifications.
//!
//! Explicit user actions (a manual fetch, a submit) report their outcome
//! as a transient notification. Background polls never notify.

use std::sync::Mutex;

use tracing::{error, info};

/// Shown after a successful submit.
pub const MSG_SAVED: &str = "Parameters were saved successfully.";

/// Shown when a user-triggered fetch fails.
pub const MSG_LOAD_FAILED: &str = "Failed to load parameters. Try reloading the page.";

/// Shown when a submit fails.
pub const MSG_SAVE_FAILED: &str = "Failed to update parameters. Try again later.";

/// Sink for transient user notifications.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        info!(target: "coopdash::notify", "{}", message);
    }

    fn error(&self, message: &str) {
        error!(target: "coopdash::notify", "{}", message);
    }
}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }
}

impl Notifier for CollectingNotifier {
    fn success(&self, message: &str) {
        self.push(Notification::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Notification::Error(message.to_string()));
    }
}
