//! User-facing notifications.
//!
//! Session and dashboard code report outcomes ("Welcome, A!", "New sale: ...") through a
//! [`Notifier`] instead of printing. Frontends decide how to surface them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    #[allow(missing_docs)]
    pub level: NotificationLevel,
    #[allow(missing_docs)]
    pub message: String,
    /// How long the message should stay visible, when the producer cares.
    pub duration: Option<Duration>,
}

impl Notification {
    #[allow(missing_docs)]
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            duration: None,
        }
    }

    #[allow(missing_docs)]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    #[allow(missing_docs)]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    #[allow(missing_docs)]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    #[allow(missing_docs)]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    #[allow(missing_docs)]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    #[allow(missing_docs)]
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Writes notifications to the log. Used when no frontend is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(level = ?notification.level, "{}", notification.message)
            }
            NotificationLevel::Warning => tracing::warn!("{}", notification.message),
            NotificationLevel::Error => tracing::error!("{}", notification.message),
        }
    }
}

/// Fans notifications out to any number of subscribers.
///
/// Notifications sent while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: broadcast::Sender<Notification>,
}

impl ChannelNotifier {
    #[allow(missing_docs)]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[allow(missing_docs)]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // No receivers is not an error
        let _ = self.sender.send(notification);
    }
}
