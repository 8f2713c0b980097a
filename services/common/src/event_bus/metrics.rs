//! Metrics collection for the event bus

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Bus metrics collector
#[derive(Debug)]
pub struct BusMetrics {
    /// Messages handed to the channel
    published: AtomicU64,
    /// Messages published while nobody was listening
    no_listeners: AtomicU64,
    /// Messages received by listeners
    delivered: AtomicU64,
    /// Messages listeners skipped after falling behind
    lagged: AtomicU64,
    /// Messages dropped by a listener's key filter
    filtered: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl BusMetrics {
    /// Create new metrics collector
    #[must_use]
    pub fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            no_listeners: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            lagged: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a successful publish
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a publish with no listener attached
    pub fn record_no_listeners(&self) {
        self.no_listeners.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message received by a listener
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record messages skipped by a lagging listener
    pub fn record_lagged(&self, skipped: u64) {
        self.lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    /// Record a message a filtered listener had no interest in
    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    #[must_use]
    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            published: self.published.load(Ordering::Relaxed),
            no_listeners: self.no_listeners.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            lagged: self.lagged.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
        }
    }
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMetricsSnapshot {
    /// Bus uptime in seconds
    pub uptime_seconds: u64,
    /// Messages published with at least one listener
    pub published: u64,
    /// Messages published with no listener
    pub no_listeners: u64,
    /// Messages received across all listeners
    pub delivered: u64,
    /// Messages skipped by lagging listeners
    pub lagged: u64,
    /// Messages dropped by key filters
    pub filtered: u64,
}

impl BusMetricsSnapshot {
    /// Total publish calls, with or without listeners
    #[must_use]
    pub const fn total_publishes(&self) -> u64 {
        self.published + self.no_listeners
    }
}
