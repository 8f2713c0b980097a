//! FamVest tick distribution hub
//!
//! One STOMP-over-WebSocket session per client feeds every consuming view.
//! Views register instrument tokens with a reference-counted registry and
//! receive tick batches narrowed to their own tokens from a fan-out bus.
//! Order-status pushes travel on a second bus.
//!
//! Around the live feed sit the REST client, the derived-metric reducers the
//! screens fold ticks into, the dashboard loader, bulk order actions and the
//! persisted client state.

pub mod bulk;
pub mod dashboard;
pub mod debounce;
pub mod derived;
pub mod margin;
pub mod order_updates;
pub mod registry;
pub mod rest;
pub mod storage;
pub mod transport;
pub mod view;

pub use registry::{SubscriptionRegistry, UnsubscribeAck};
pub use transport::TransportConnection;
pub use view::{ViewPhase, ViewSubscription};

use services_common::{
    ClientConfig, ConnectionState, FanOutBus, FilteredListener, InstrumentToken, Listener,
    OrderUpdateEvent, ServiceResult, TickBatch, TokenProvider, WireSink,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Client-side hub owning the live connection, the registry and both buses
pub struct TickHub {
    config: ClientConfig,
    transport: Arc<TransportConnection>,
    registry: Arc<SubscriptionRegistry>,
    ticks: FanOutBus<TickBatch>,
    orders: FanOutBus<OrderUpdateEvent>,
    replay_task: JoinHandle<()>,
}

impl std::fmt::Debug for TickHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHub")
            .field("ws_url", &self.config.ws_url)
            .field("state", &self.transport.current_state())
            .field("tracked_tokens", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl TickHub {
    /// Open the live connection described by `config`
    ///
    /// Fails immediately with `MissingToken` when `tokens` has no token.
    /// Must be called within a tokio runtime.
    pub fn connect(config: ClientConfig, tokens: Arc<dyn TokenProvider>) -> ServiceResult<Self> {
        config.validate()?;

        let ticks = FanOutBus::new("ticks", config.tick_channel_capacity);
        let orders = FanOutBus::new("orders", config.order_channel_capacity);
        let transport = Arc::new(TransportConnection::connect(
            &config,
            tokens,
            ticks.clone(),
            orders.clone(),
        )?);
        let wire: Arc<dyn WireSink> = transport.clone();
        let registry = Arc::new(SubscriptionRegistry::new(wire, config.unsubscribe_settle()));

        let replay_task = tokio::spawn(track_connection(
            transport.connection_state(),
            Arc::clone(&registry),
            config.replay_on_reconnect,
        ));

        info!(ws_url = %config.ws_url, replay = config.replay_on_reconnect, "Tick hub started");
        Ok(Self {
            config,
            transport,
            registry,
            ticks,
            orders,
            replay_task,
        })
    }

    /// Configuration the hub runs with
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Hot stream of connection states, replaying the latest
    #[must_use]
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.connection_state()
    }

    /// Every tick batch from now on
    #[must_use]
    pub fn ticks(&self) -> Listener<TickBatch> {
        self.ticks.subscribe()
    }

    /// Tick batches narrowed to `tokens`
    #[must_use]
    pub fn ticks_for(&self, tokens: &[InstrumentToken]) -> FilteredListener<TickBatch> {
        self.ticks.subscribe_filtered(tokens.iter().copied())
    }

    /// Every order update from now on
    #[must_use]
    pub fn order_updates(&self) -> Listener<OrderUpdateEvent> {
        self.orders.subscribe()
    }

    /// Register interest in `tokens`
    pub fn subscribe(&self, tokens: &[InstrumentToken]) {
        self.registry.subscribe(tokens);
    }

    /// Release interest in `tokens`
    pub fn unsubscribe(&self, tokens: &[InstrumentToken]) -> UnsubscribeAck {
        self.registry.unsubscribe(tokens)
    }

    /// Shared subscription registry
    #[must_use]
    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    /// New view over `tokens`; call [`ViewSubscription::activate`] to register them
    pub fn view(&self, name: impl Into<String>, tokens: Vec<InstrumentToken>) -> ViewSubscription {
        ViewSubscription::new(
            name,
            tokens,
            Arc::clone(&self.registry),
            self.transport.connection_state(),
            &self.ticks,
            self.config.replay_on_reconnect,
        )
    }

    /// Close the live connection and stop reconnecting
    pub async fn close(&self) {
        self.replay_task.abort();
        self.transport.close().await;
    }
}

impl Drop for TickHub {
    fn drop(&mut self) {
        self.replay_task.abort();
    }
}

/// Keep registry entries in step with the connection
///
/// Entries fall back to wanted when the session drops. On every transition
/// into connected, all tracked tokens are replayed in one batch unless
/// replay is left to the views. The state seen on the first poll counts as a
/// transition, so a session that connected before this task ran still
/// replays.
async fn track_connection(
    mut state: watch::Receiver<ConnectionState>,
    registry: Arc<SubscriptionRegistry>,
    replay: bool,
) {
    let mut was_connected = false;
    loop {
        let connected = state.borrow_and_update().is_connected();
        match (was_connected, connected) {
            (false, true) if replay => {
                let replayed = registry.resubscribe_all();
                info!(replayed, "Subscriptions replayed after connect");
            }
            (true, false) => {
                registry.mark_disconnected();
                debug!("Subscriptions marked wanted after disconnect");
            }
            _ => {}
        }
        was_connected = connected;
        if state.changed().await.is_err() {
            break;
        }
    }
}
