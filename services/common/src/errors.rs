//! Common error types for services

use serde::Deserialize;
use thiserror::Error;

/// Service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No bearer token available when opening the live connection
    #[error("Cannot establish live connection: token is missing")]
    MissingToken,

    /// Backend rejected the session (401/403)
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Structured business error returned by the backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Connection failed error
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation needs a live connection
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Malformed STOMP frame or payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Client-side storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result alias used across the services
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error body returned by the backend
#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    message: Option<String>,
}

impl ServiceError {
    /// Map a non-success HTTP status and its body to a service error
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<BackendErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty());

        match status {
            401 | 403 => Self::SessionExpired(
                message.unwrap_or_else(|| format!("HTTP {status}")),
            ),
            _ => match message {
                Some(message) => Self::Backend(message),
                None => Self::ConnectionFailed(format!("HTTP {status}")),
            },
        }
    }

    /// Whether this error forces a logout
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    /// Text shown to the user for this error
    ///
    /// Backend business errors carry their own message; everything else falls
    /// back to the caller's generic text.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Backend(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }
}
