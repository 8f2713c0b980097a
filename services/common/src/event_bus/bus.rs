//! Core bus implementation over `tokio::sync::broadcast`

use super::{BusMessage, BusMetrics, Keyed};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{debug, trace, warn};

/// Broadcast bus delivering each message to every attached listener
#[derive(Debug, Clone)]
pub struct FanOutBus<T: BusMessage> {
    /// Bus name for logs
    name: &'static str,
    /// Broadcast sender
    sender: broadcast::Sender<T>,
    /// Shared metrics
    metrics: Arc<BusMetrics>,
    /// Channel capacity
    capacity: usize,
}

impl<T: BusMessage> FanOutBus<T> {
    /// Create a bus holding at most `capacity` undelivered messages per listener
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            name,
            sender,
            metrics: Arc::new(BusMetrics::new()),
            capacity,
        }
    }

    /// Bus name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Channel capacity
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish to every current listener
    ///
    /// Returns how many listeners the message reached. Publishing with nobody
    /// listening is counted, not an error.
    pub fn publish(&self, message: T) -> usize {
        let topic = message.topic().to_string();
        if let Ok(listeners) = self.sender.send(message) {
            trace!(bus = self.name, topic = %topic, listeners, "Message published");
            self.metrics.record_published();
            listeners
        } else {
            debug!(bus = self.name, topic = %topic, "No listeners attached, message dropped");
            self.metrics.record_no_listeners();
            0
        }
    }

    /// Attach a listener receiving every message published from now on
    #[must_use]
    pub fn subscribe(&self) -> Listener<T> {
        Listener {
            name: self.name,
            receiver: self.sender.subscribe(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Number of attached listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Shared metrics
    #[must_use]
    pub fn metrics(&self) -> Arc<BusMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl<T: Keyed> FanOutBus<T> {
    /// Attach a listener that only sees messages narrowed to `keys`
    pub fn subscribe_filtered<I>(&self, keys: I) -> FilteredListener<T>
    where
        I: IntoIterator<Item = T::Key>,
    {
        FilteredListener {
            inner: self.subscribe(),
            keys: keys.into_iter().collect(),
        }
    }
}

/// Receiving end of a [`FanOutBus`]
#[derive(Debug)]
pub struct Listener<T: BusMessage> {
    name: &'static str,
    receiver: broadcast::Receiver<T>,
    metrics: Arc<BusMetrics>,
}

impl<T: BusMessage> Listener<T> {
    /// Wait for the next message
    ///
    /// Messages lost to lag are skipped with a warning. Returns `None` once
    /// every publisher is gone.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => {
                    self.metrics.record_delivered();
                    return Some(message);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(bus = self.name, skipped, "Listener lagged, skipping messages");
                    self.metrics.record_lagged(skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next message if one is already queued
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => {
                    self.metrics.record_delivered();
                    return Some(message);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(bus = self.name, skipped, "Listener lagged, skipping messages");
                    self.metrics.record_lagged(skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Listener that narrows each message to its own key set
#[derive(Debug)]
pub struct FilteredListener<T: Keyed> {
    inner: Listener<T>,
    keys: FxHashSet<T::Key>,
}

impl<T: Keyed> FilteredListener<T> {
    /// Wait for the next message with something of interest
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let message = self.inner.recv().await?;
            if let Some(narrowed) = message.narrow(&self.keys) {
                return Some(narrowed);
            }
            self.inner.metrics.record_filtered();
        }
    }

    /// Replace the key set
    pub fn set_keys<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = T::Key>,
    {
        self.keys = keys.into_iter().collect();
    }

    /// Current key set
    #[must_use]
    pub const fn keys(&self) -> &FxHashSet<T::Key> {
        &self.keys
    }
}
