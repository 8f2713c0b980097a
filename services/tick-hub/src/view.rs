//! Subscription lifecycle of one consuming view
//!
//! A view waits for the connection, registers its tokens, receives only the
//! ticks it asked for and releases its tokens when closed or dropped.

use crate::derived::TickReducer;
use crate::registry::{SubscriptionRegistry, UnsubscribeAck};
use services_common::{
    ConnectionState, FanOutBus, FilteredListener, InstrumentToken, ServiceError, ServiceResult,
    TickBatch,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Where a view is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    /// Created, nothing registered
    Unsubscribed,
    /// Waiting for the live connection
    AwaitingConnection,
    /// Tokens registered
    Subscribed,
    /// Released; no further ticks
    Closed,
}

/// Tick subscription owned by one view
pub struct ViewSubscription {
    name: String,
    tokens: Vec<InstrumentToken>,
    registry: Arc<SubscriptionRegistry>,
    state: watch::Receiver<ConnectionState>,
    listener: FilteredListener<TickBatch>,
    phase: ViewPhase,
    batch_size: Option<usize>,
    replay_on_reconnect: bool,
}

impl std::fmt::Debug for ViewSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewSubscription")
            .field("name", &self.name)
            .field("tokens", &self.tokens.len())
            .field("phase", &self.phase)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ViewSubscription {
    /// View `name` interested in `tokens`
    ///
    /// With `replay_on_reconnect` off, the view re-sends its own tokens each
    /// time the connection comes back.
    pub fn new(
        name: impl Into<String>,
        tokens: Vec<InstrumentToken>,
        registry: Arc<SubscriptionRegistry>,
        state: watch::Receiver<ConnectionState>,
        ticks: &FanOutBus<TickBatch>,
        replay_on_reconnect: bool,
    ) -> Self {
        let listener = ticks.subscribe_filtered(tokens.iter().copied());
        Self {
            name: name.into(),
            tokens,
            registry,
            state,
            listener,
            phase: ViewPhase::Unsubscribed,
            batch_size: None,
            replay_on_reconnect,
        }
    }

    /// Send subscribes in chunks of at most `size` tokens
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size.max(1));
        self
    }

    /// View name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tokens of interest
    #[must_use]
    pub fn tokens(&self) -> &[InstrumentToken] {
        &self.tokens
    }

    /// Lifecycle phase
    #[must_use]
    pub const fn phase(&self) -> ViewPhase {
        self.phase
    }

    /// Wait for the connection, then register the view's tokens
    ///
    /// A view without tokens stays `Unsubscribed`.
    pub async fn activate(&mut self) -> ServiceResult<()> {
        match self.phase {
            ViewPhase::Subscribed => return Ok(()),
            ViewPhase::Closed => {
                return Err(ServiceError::InternalError(format!(
                    "view '{}' is closed",
                    self.name
                )));
            }
            ViewPhase::Unsubscribed | ViewPhase::AwaitingConnection => {}
        }
        if self.tokens.is_empty() {
            debug!(view = %self.name, "No instrument tokens to subscribe");
            return Ok(());
        }

        self.phase = ViewPhase::AwaitingConnection;
        self.state
            .wait_for(|state| state.is_connected())
            .await
            .map_err(|_| ServiceError::NotConnected("live connection closed".to_string()))?;

        for chunk in self.chunks() {
            self.registry.subscribe(chunk);
        }
        self.phase = ViewPhase::Subscribed;
        info!(view = %self.name, tokens = self.tokens.len(), "View subscribed");
        Ok(())
    }

    /// Next batch of ticks for this view's tokens
    ///
    /// Returns `None` once the hub is gone.
    pub async fn next_batch(&mut self) -> Option<TickBatch> {
        if self.phase == ViewPhase::Closed {
            return None;
        }
        loop {
            tokio::select! {
                biased;
                changed = self.state.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    let state = *self.state.borrow_and_update();
                    if state.is_connected()
                        && !self.replay_on_reconnect
                        && self.phase == ViewPhase::Subscribed
                    {
                        debug!(view = %self.name, "Re-sending view subscription after reconnect");
                        for chunk in self.chunks() {
                            self.registry.reassert(chunk);
                        }
                    }
                }
                batch = self.listener.recv() => return batch,
            }
        }
    }

    /// Feed every batch into `reducer` until the hub is gone
    pub async fn drive<R: TickReducer>(&mut self, reducer: &mut R) {
        while let Some(batch) = self.next_batch().await {
            let changed = reducer.apply_ticks(&batch);
            if changed > 0 {
                debug!(view = %self.name, changed, "Rows updated");
            }
        }
    }

    /// Switch to `tokens`: release the old set, wait for the ack, register the new one
    pub async fn retarget(&mut self, tokens: Vec<InstrumentToken>) -> ServiceResult<()> {
        if self.phase == ViewPhase::Subscribed {
            self.release().await;
        }
        self.phase = ViewPhase::Unsubscribed;
        self.listener.set_keys(tokens.iter().copied());
        self.tokens = tokens;
        self.activate().await
    }

    /// Release the view's tokens; further batches are not delivered
    pub fn close(&mut self) -> UnsubscribeAck {
        let ack = if self.phase == ViewPhase::Subscribed {
            self.release()
        } else {
            UnsubscribeAck::settled()
        };
        self.phase = ViewPhase::Closed;
        ack
    }

    fn release(&self) -> UnsubscribeAck {
        let mut last = UnsubscribeAck::settled();
        for chunk in self.chunks() {
            let ack = self.registry.unsubscribe(chunk);
            if !ack.is_settled() {
                last = ack;
            }
        }
        debug!(view = %self.name, "View released");
        last
    }

    fn chunks(&self) -> std::slice::Chunks<'_, InstrumentToken> {
        let size = self.batch_size.unwrap_or(self.tokens.len()).max(1);
        self.tokens.chunks(size)
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        if self.phase == ViewPhase::Subscribed {
            drop(self.release());
            self.phase = ViewPhase::Closed;
        }
    }
}
