//! User-facing notifications for interactive sync calls.
//!
//! Purely observational: nothing a sink does can change the outcome of an attempt.

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

pub trait NotificationSink: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Collects notifications so a caller can return them (HTTP API, tests).
#[derive(Debug, Default)]
pub struct InMemoryNotificationSink {
    inner: std::sync::Mutex<Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.inner.lock().map(|n| n.clone()).unwrap_or_default()
    }

    fn push(&self, level: NotificationLevel, message: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.push(Notification {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn success(&self, message: &str) {
        self.push(NotificationLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.push(NotificationLevel::Error, message);
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn success(&self, message: &str) {
        info!(notification = "success", "{message}");
    }

    fn error(&self, message: &str) {
        warn!(notification = "error", "{message}");
    }
}
