//! User-facing notifications
//!
//! The client reports errors and push events as short titled messages. The
//! sink is a trait so the binary can log them and tests can record them.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Completed action
    Success,
    /// Needs attention
    Warning,
    /// Failed action
    Error,
}

/// One user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity
    pub severity: Severity,
    /// Short title
    pub title: String,
    /// Message text
    pub message: String,
    /// Stays until dismissed
    pub sticky: bool,
}

impl Notification {
    /// Info notification
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, message)
    }

    /// Success notification
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, message)
    }

    /// Warning notification
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, message)
    }

    /// Error notification
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, message)
    }

    fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
            sticky: false,
        }
    }

    /// Keep the notification until dismissed
    #[must_use]
    pub const fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }
}

/// Notification sink
pub trait Notifier: Send + Sync {
    /// Show a notification
    fn notify(&self, notification: Notification);
}

/// Notifier that writes to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification {
            severity,
            title,
            message,
            sticky,
        } = notification;
        match severity {
            Severity::Info | Severity::Success => info!(%title, sticky, "{message}"),
            Severity::Warning => warn!(%title, sticky, "{message}"),
            Severity::Error => error!(%title, sticky, "{message}"),
        }
    }
}
