// ─── Notifications ───
// Human-readable, fire-and-forget reports for skips and failures.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub details: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, details: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            details: details.into(),
            severity,
            created_at: Utc::now(),
        }
    }
}

/// Delivery must never block nor fail the caller.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification);
}

/// Writes notifications to the tracing log only.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send(&self, n: Notification) {
        match n.severity {
            Severity::Info => info!("{}: {}", n.title, n.details),
            Severity::Warning => warn!("{}: {}", n.title, n.details),
            Severity::Error => error!("{}: {}", n.title, n.details),
        }
    }
}

/// Broadcasts notifications to subscribers and mirrors them to the log.
/// Notifications sent while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: broadcast::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Notifier for ChannelNotifier {
    fn send(&self, notification: Notification) {
        TracingNotifier.send(notification.clone());
        let _ = self.tx.send(notification);
    }
}
