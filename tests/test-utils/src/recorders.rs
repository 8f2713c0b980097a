//! Recording doubles for the outbound seams

use parking_lot::Mutex;
use serde_json::Value;
use services_common::{
    InstrumentToken, Notification, Notifier, ServiceError, ServiceResult, WireSink,
    SUBSCRIBE_DESTINATION, UNSUBSCRIBE_DESTINATION,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// One message handed to the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// STOMP destination
    pub destination: String,
    /// Tokens carried in the body, empty when the body has none
    pub tokens: Vec<InstrumentToken>,
    /// Raw JSON body
    pub body: String,
}

/// Wire that records every publish instead of sending it
///
/// Publishing while disconnected fails the same way the live connection does.
#[derive(Debug, Default)]
pub struct RecordingWire {
    connected: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingWire {
    /// Wire starting in the given connection state
    #[must_use]
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Flip the connection state
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Everything published so far
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Token lists of every subscribe, in order
    #[must_use]
    pub fn subscribes(&self) -> Vec<Vec<InstrumentToken>> {
        self.tokens_sent_to(SUBSCRIBE_DESTINATION)
    }

    /// Token lists of every unsubscribe, in order
    #[must_use]
    pub fn unsubscribes(&self) -> Vec<Vec<InstrumentToken>> {
        self.tokens_sent_to(UNSUBSCRIBE_DESTINATION)
    }

    /// Forget recorded messages
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    fn tokens_sent_to(&self, destination: &str) -> Vec<Vec<InstrumentToken>> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.destination == destination)
            .map(|m| m.tokens.clone())
            .collect()
    }
}

impl WireSink for RecordingWire {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, destination: &str, body: String) -> ServiceResult<()> {
        if !self.is_connected() {
            return Err(ServiceError::NotConnected(destination.to_string()));
        }
        let tokens = tokens_in(&body);
        self.sent.lock().push(SentMessage {
            destination: destination.to_string(),
            tokens,
            body,
        });
        Ok(())
    }
}

/// Tokens listed under `instrumentTokens` in a JSON body
#[must_use]
pub fn tokens_in(body: &str) -> Vec<InstrumentToken> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("instrumentTokens").cloned())
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Notifier keeping every notification for inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Notifications in the order they were shown
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }

    /// Titles in the order they were shown
    #[must_use]
    pub fn titles(&self) -> Vec<String> {
        self.shown.lock().iter().map(|n| n.title.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.shown.lock().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disconnected_publish_fails() {
        let wire = RecordingWire::new(false);
        assert!(wire.publish(SUBSCRIBE_DESTINATION, "{}".to_string()).is_err());
        assert!(wire.sent().is_empty());
    }

    #[test]
    fn test_tokens_extracted() {
        let wire = RecordingWire::new(true);
        wire.publish(SUBSCRIBE_DESTINATION, r#"{"instrumentTokens":[5,6]}"#.to_string())
            .unwrap();
        wire.publish(UNSUBSCRIBE_DESTINATION, r#"{"instrumentTokens":[5]}"#.to_string())
            .unwrap();

        assert_eq!(wire.subscribes(), vec![vec![5, 6]]);
        assert_eq!(wire.unsubscribes(), vec![vec![5]]);
        wire.clear();
        assert!(wire.sent().is_empty());
    }
}
