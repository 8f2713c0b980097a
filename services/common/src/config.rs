//! Client configuration
//!
//! A `ClientConfig` must be built before any REST client or live connection is
//! created; both take it by reference at construction.

use crate::constants::{
    DEV_BASE_URL, DEV_WS_URL, HANDSHAKE_TIMEOUT_MS, HEART_BEAT_MS, ORDER_CHANNEL_CAPACITY, PROD_REST_PATH, PROD_WS_PATH,
    RECONNECT_DELAY_MS, TICK_CHANNEL_CAPACITY, UNSUBSCRIBE_SETTLE_MS,
};
use crate::errors::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local backend on port 8090
    Development,
    /// Backend served behind the same origin as the client
    Production,
}

impl std::str::FromStr for Environment {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Development),
            "prod" | "production" => Ok(Self::Production),
            other => Err(ServiceError::InvalidConfig(format!(
                "unknown environment '{other}'"
            ))),
        }
    }
}

/// Client configuration shared by the REST client and the live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Active environment
    pub environment: Environment,
    /// REST base URL, e.g. `http://localhost:8090/rest`
    pub base_url: String,
    /// Raw WebSocket endpoint of the STOMP broker
    pub ws_url: String,
    /// Directory backing client-side storage
    pub storage_dir: PathBuf,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay_ms: u64,
    /// Deadline for opening the socket and receiving CONNECTED
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Heart-beat interval offered to the broker; 0 disables it
    #[serde(default = "default_heart_beat_ms")]
    pub heart_beat_ms: u64,
    /// Delay before an unsubscribe is considered applied
    pub unsubscribe_settle_ms: u64,
    /// Replay tracked subscriptions after every reconnect
    pub replay_on_reconnect: bool,
    /// Broadcast capacity for tick batches
    pub tick_channel_capacity: usize,
    /// Broadcast capacity for order updates
    pub order_channel_capacity: usize,
    /// Optional HTTP timeout; `None` waits indefinitely
    pub http_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Defaults for local development
    #[must_use]
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            base_url: DEV_BASE_URL.to_string(),
            ws_url: DEV_WS_URL.to_string(),
            storage_dir: default_storage_dir(),
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            handshake_timeout_ms: HANDSHAKE_TIMEOUT_MS,
            heart_beat_ms: HEART_BEAT_MS,
            unsubscribe_settle_ms: UNSUBSCRIBE_SETTLE_MS,
            replay_on_reconnect: true,
            tick_channel_capacity: TICK_CHANNEL_CAPACITY,
            order_channel_capacity: ORDER_CHANNEL_CAPACITY,
            http_timeout_ms: None,
        }
    }

    /// Defaults for a backend served at `origin` (e.g. `https://famvest.example`)
    pub fn production(origin: &str) -> ServiceResult<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| ServiceError::InvalidConfig(format!("invalid origin '{origin}': {e}")))?;
        let base = origin.as_str().trim_end_matches('/');

        let ws_scheme = match origin.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(ServiceError::InvalidConfig(format!(
                    "unsupported origin scheme '{other}'"
                )));
            }
        };
        let host = origin
            .host_str()
            .ok_or_else(|| ServiceError::InvalidConfig("origin has no host".to_string()))?;
        let authority = match origin.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            environment: Environment::Production,
            base_url: format!("{base}{PROD_REST_PATH}"),
            ws_url: format!("{ws_scheme}://{authority}{PROD_WS_PATH}"),
            ..Self::development()
        })
    }

    /// Build configuration from process environment (and `.env`, if present)
    pub fn from_env() -> ServiceResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// Recognised variables: `FAMVEST_ENV`, `FAMVEST_ORIGIN`, `FAMVEST_BASE_URL`,
    /// `FAMVEST_WS_URL`, `FAMVEST_STORAGE_DIR`, `FAMVEST_RECONNECT_DELAY_MS`,
    /// `FAMVEST_HANDSHAKE_TIMEOUT_MS`, `FAMVEST_HEART_BEAT_MS`,
    /// `FAMVEST_REPLAY_ON_RECONNECT`, `FAMVEST_HTTP_TIMEOUT_MS`.
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("FAMVEST_ENV") {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        let mut config = match environment {
            Environment::Development => Self::development(),
            Environment::Production => {
                let origin = lookup("FAMVEST_ORIGIN").ok_or_else(|| {
                    ServiceError::InvalidConfig(
                        "FAMVEST_ORIGIN is required in production".to_string(),
                    )
                })?;
                Self::production(&origin)?
            }
        };

        if let Some(base_url) = lookup("FAMVEST_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(ws_url) = lookup("FAMVEST_WS_URL") {
            config.ws_url = ws_url;
        }
        if let Some(dir) = lookup("FAMVEST_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(delay) = lookup("FAMVEST_RECONNECT_DELAY_MS") {
            config.reconnect_delay_ms = parse_number("FAMVEST_RECONNECT_DELAY_MS", &delay)?;
        }
        if let Some(timeout) = lookup("FAMVEST_HANDSHAKE_TIMEOUT_MS") {
            config.handshake_timeout_ms = parse_number("FAMVEST_HANDSHAKE_TIMEOUT_MS", &timeout)?;
        }
        if let Some(interval) = lookup("FAMVEST_HEART_BEAT_MS") {
            config.heart_beat_ms = parse_number("FAMVEST_HEART_BEAT_MS", &interval)?;
        }
        if let Some(replay) = lookup("FAMVEST_REPLAY_ON_RECONNECT") {
            config.replay_on_reconnect = matches!(
                replay.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(timeout) = lookup("FAMVEST_HTTP_TIMEOUT_MS") {
            config.http_timeout_ms = Some(parse_number("FAMVEST_HTTP_TIMEOUT_MS", &timeout)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check URLs are usable
    pub fn validate(&self) -> ServiceResult<()> {
        let ws = Url::parse(&self.ws_url)
            .map_err(|e| ServiceError::InvalidConfig(format!("invalid ws_url: {e}")))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(ServiceError::InvalidConfig(format!(
                "ws_url must use ws:// or wss://, got '{}'",
                self.ws_url
            )));
        }
        Url::parse(&self.base_url)
            .map_err(|e| ServiceError::InvalidConfig(format!("invalid base_url: {e}")))?;
        if self.handshake_timeout_ms == 0 {
            return Err(ServiceError::InvalidConfig(
                "handshake_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Reconnect delay as a duration
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Handshake deadline as a duration
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Offered heart-beat interval as a duration
    #[must_use]
    pub const fn heart_beat(&self) -> Duration {
        Duration::from_millis(self.heart_beat_ms)
    }

    /// Unsubscribe settle delay as a duration
    #[must_use]
    pub const fn unsubscribe_settle(&self) -> Duration {
        Duration::from_millis(self.unsubscribe_settle_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./cache/famvest")
}

const fn default_handshake_timeout_ms() -> u64 {
    HANDSHAKE_TIMEOUT_MS
}

const fn default_heart_beat_ms() -> u64 {
    HEART_BEAT_MS
}

fn parse_number(name: &str, value: &str) -> ServiceResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| ServiceError::InvalidConfig(format!("{name}='{value}': {e}")))
}
