//! Connection state and the outbound wire seam

use crate::errors::ServiceResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Live connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No session
    #[default]
    Disconnected,
    /// Socket open, STOMP handshake in progress
    Connecting,
    /// Session established and inbound queues subscribed
    Connected,
}

impl ConnectionState {
    /// Whether wire-level publishes are possible
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Outbound side of the live connection
///
/// Implementations must not block: `publish` only queues the message.
pub trait WireSink: Send + Sync {
    /// Whether a session is currently established
    fn is_connected(&self) -> bool;

    /// Queue a JSON body for `destination`
    fn publish(&self, destination: &str, body: String) -> ServiceResult<()>;
}
