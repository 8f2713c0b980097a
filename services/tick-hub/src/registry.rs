//! Reference-counted instrument subscriptions
//!
//! Many views can be interested in the same instrument while the server only
//! needs to hear about it once. The registry counts interest per token and
//! talks to the wire only on the first-listener and last-listener
//! transitions, except for `subscribe`, which always forwards the caller's
//! full list.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use services_common::{
    InstrumentToken, ServiceResult, WireSink, SUBSCRIBE_DESTINATION, UNSUBSCRIBE_DESTINATION,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::{debug, info, warn};

/// Whether the server has been told about a tracked token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryState {
    /// Wanted locally, not yet sent on the current session
    #[default]
    Wanted,
    /// Sent on the current session
    Active,
}

/// Interest in one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionEntry {
    /// Number of outstanding subscribe calls
    pub count: u32,
    /// Wire state
    pub state: EntryState,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenPayload<'a> {
    instrument_tokens: &'a [InstrumentToken],
}

/// Instrument subscription registry
pub struct SubscriptionRegistry {
    entries: Mutex<FxHashMap<InstrumentToken, SubscriptionEntry>>,
    wire: Arc<dyn WireSink>,
    settle: Duration,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("tracked", &self.entries.lock().len())
            .field("settle", &self.settle)
            .field("wire", &"Arc<dyn WireSink>")
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Registry publishing through `wire`; unsubscribe acks settle after `settle`
    pub fn new(wire: Arc<dyn WireSink>, settle: Duration) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            wire,
            settle,
        }
    }

    /// Register interest in `tokens`
    ///
    /// Every token's count goes up by one. When connected, the whole input
    /// list is sent in one message, even tokens that were already active.
    /// While disconnected the entries stay `Wanted` and nothing is sent.
    pub fn subscribe(&self, tokens: &[InstrumentToken]) {
        if tokens.is_empty() {
            debug!("Subscribe called with no tokens, ignoring");
            return;
        }

        let mut entries = self.entries.lock();
        for &token in tokens {
            entries.entry(token).or_default().count += 1;
        }

        if !self.wire.is_connected() {
            warn!(
                tokens = tokens.len(),
                "Live connection not established, subscription deferred"
            );
            return;
        }

        match self.send(SUBSCRIBE_DESTINATION, tokens) {
            Ok(()) => {
                for token in tokens {
                    if let Some(entry) = entries.get_mut(token) {
                        entry.state = EntryState::Active;
                    }
                }
                debug!(tokens = tokens.len(), "Subscribed instruments");
            }
            Err(e) => warn!(error = %e, "Failed to send subscribe"),
        }
    }

    /// Drop one unit of interest in each of `tokens`
    ///
    /// Tokens whose count reaches zero are removed and sent to the server in
    /// one batch. Untracked tokens are ignored. The returned ack completes
    /// once the server has had time to apply the removal.
    pub fn unsubscribe(&self, tokens: &[InstrumentToken]) -> UnsubscribeAck {
        let mut entries = self.entries.lock();
        let mut released = Vec::new();

        for &token in tokens {
            match entries.get_mut(&token) {
                Some(entry) if entry.count > 1 => entry.count -= 1,
                Some(_) => {
                    entries.remove(&token);
                    released.push(token);
                }
                None => {}
            }
        }

        if released.is_empty() {
            return UnsubscribeAck::settled();
        }
        if !self.wire.is_connected() {
            debug!(
                tokens = released.len(),
                "Released instruments while disconnected, nothing to send"
            );
            return UnsubscribeAck::settled();
        }

        match self.send(UNSUBSCRIBE_DESTINATION, &released) {
            Ok(()) => {
                debug!(tokens = released.len(), "Unsubscribed instruments");
                UnsubscribeAck::after(self.settle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to send unsubscribe");
                UnsubscribeAck::settled()
            }
        }
    }

    /// Send every tracked token as one subscribe batch
    ///
    /// Called on each transition into `Connected`. Returns how many tokens
    /// were replayed.
    pub fn resubscribe_all(&self) -> usize {
        let mut entries = self.entries.lock();
        if entries.is_empty() || !self.wire.is_connected() {
            return 0;
        }

        let mut tokens: Vec<_> = entries.keys().copied().collect();
        tokens.sort_unstable();

        match self.send(SUBSCRIBE_DESTINATION, &tokens) {
            Ok(()) => {
                for entry in entries.values_mut() {
                    entry.state = EntryState::Active;
                }
                info!(tokens = tokens.len(), "Replayed subscriptions");
                tokens.len()
            }
            Err(e) => {
                warn!(error = %e, "Failed to replay subscriptions");
                0
            }
        }
    }

    /// Re-send `tokens` without touching their counts
    ///
    /// Used by views when automatic replay is disabled. Untracked tokens are
    /// skipped. Returns whether anything was sent.
    pub fn reassert(&self, tokens: &[InstrumentToken]) -> bool {
        let mut entries = self.entries.lock();
        let tracked: Vec<_> = tokens
            .iter()
            .copied()
            .filter(|t| entries.contains_key(t))
            .collect();
        if tracked.is_empty() || !self.wire.is_connected() {
            return false;
        }

        match self.send(SUBSCRIBE_DESTINATION, &tracked) {
            Ok(()) => {
                for token in &tracked {
                    if let Some(entry) = entries.get_mut(token) {
                        entry.state = EntryState::Active;
                    }
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to re-send subscribe");
                false
            }
        }
    }

    /// Demote every active entry to `Wanted` after the session dropped
    pub fn mark_disconnected(&self) {
        for entry in self.entries.lock().values_mut() {
            entry.state = EntryState::Wanted;
        }
    }

    /// Outstanding subscribe count for `token`, 0 when untracked
    #[must_use]
    pub fn count(&self, token: InstrumentToken) -> u32 {
        self.entries.lock().get(&token).map_or(0, |e| e.count)
    }

    /// Entry for `token`, `None` when untracked
    #[must_use]
    pub fn entry(&self, token: InstrumentToken) -> Option<SubscriptionEntry> {
        self.entries.lock().get(&token).copied()
    }

    /// Tracked tokens in ascending order
    #[must_use]
    pub fn tracked_tokens(&self) -> Vec<InstrumentToken> {
        let mut tokens: Vec<_> = self.entries.lock().keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    /// Number of tracked tokens
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// No token is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn send(&self, destination: &str, tokens: &[InstrumentToken]) -> ServiceResult<()> {
        let body = serde_json::to_string(&TokenPayload {
            instrument_tokens: tokens,
        })?;
        self.wire.publish(destination, body)
    }
}

/// Completion signal of an unsubscribe
///
/// Resolves once the settle delay has passed since the unsubscribe was sent,
/// or immediately when nothing was sent. Dropping it is fine.
#[derive(Debug)]
#[must_use = "await the ack before re-subscribing to the same tokens"]
pub struct UnsubscribeAck {
    deadline: Option<Instant>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl UnsubscribeAck {
    /// Ack that is already complete
    pub const fn settled() -> Self {
        Self {
            deadline: None,
            sleep: None,
        }
    }

    fn after(delay: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + delay),
            sleep: None,
        }
    }

    /// Whether awaiting would return immediately
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.deadline.is_none_or(|deadline| Instant::now() >= deadline)
    }
}

impl Future for UnsubscribeAck {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let Some(deadline) = this.deadline else {
            return Poll::Ready(());
        };
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(sleep_until(deadline)));
        sleep.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_utils::RecordingWire;

    fn registry(connected: bool) -> (Arc<RecordingWire>, SubscriptionRegistry) {
        let wire = Arc::new(RecordingWire::new(connected));
        let registry = SubscriptionRegistry::new(wire.clone(), Duration::from_millis(100));
        (wire, registry)
    }

    #[test]
    fn test_subscribe_sends_whole_list() {
        let (wire, registry) = registry(true);
        registry.subscribe(&[1, 2]);
        registry.subscribe(&[2, 3]);

        assert_eq!(wire.subscribes(), vec![vec![1, 2], vec![2, 3]]);
        assert_eq!(registry.count(2), 2);
        assert_eq!(registry.entry(3).map(|e| e.state), Some(EntryState::Active));
    }

    #[test]
    fn test_disconnected_subscribe_stays_wanted() {
        let (wire, registry) = registry(false);
        registry.subscribe(&[7]);

        assert!(wire.sent().is_empty());
        assert_eq!(
            registry.entry(7),
            Some(SubscriptionEntry {
                count: 1,
                state: EntryState::Wanted
            })
        );
    }

    #[test]
    fn test_empty_subscribe_is_noop() {
        let (wire, registry) = registry(true);
        registry.subscribe(&[]);
        assert!(wire.sent().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_ack_waits_for_settle() {
        let (wire, registry) = registry(true);
        registry.subscribe(&[5]);

        let ack = registry.unsubscribe(&[5]);
        assert!(!ack.is_settled());
        let started = Instant::now();
        ack.await;

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(wire.unsubscribes(), vec![vec![5]]);
    }

    #[test]
    fn test_unsubscribe_of_unknown_is_settled() {
        let (wire, registry) = registry(true);
        assert!(registry.unsubscribe(&[42]).is_settled());
        assert!(wire.sent().is_empty());
    }

    #[test]
    fn test_replay_and_demote() {
        let (wire, registry) = registry(false);
        registry.subscribe(&[9, 3]);
        registry.subscribe(&[3]);

        wire.set_connected(true);
        assert_eq!(registry.resubscribe_all(), 2);
        assert_eq!(wire.subscribes(), vec![vec![3, 9]]);
        assert_eq!(registry.count(3), 2);

        registry.mark_disconnected();
        assert_eq!(registry.entry(9).map(|e| e.state), Some(EntryState::Wanted));
    }

    #[test]
    fn test_reassert_keeps_counts() {
        let (wire, registry) = registry(true);
        registry.subscribe(&[4]);
        assert!(registry.reassert(&[4, 8]));

        assert_eq!(registry.count(4), 1);
        assert_eq!(wire.subscribes(), vec![vec![4], vec![4]]);
        assert!(!registry.reassert(&[8]));
    }
}
