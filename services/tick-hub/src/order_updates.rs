//! Order-status push handling

use parking_lot::RwLock;
use services_common::{Listener, Notification, Notifier, OrderUpdateEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Screen whose data should be reloaded after an order update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    /// Holdings screen
    Holdings,
    /// Orders screen
    Orders,
    /// Positions screen
    Positions,
}

impl RefreshTarget {
    /// Target for the screen at `route`, if it shows order-affected data
    #[must_use]
    pub fn for_route(route: &str) -> Option<Self> {
        if route.contains("/holdings") {
            Some(Self::Holdings)
        } else if route.contains("/orders") {
            Some(Self::Orders)
        } else if route.contains("/positions") {
            Some(Self::Positions)
        } else {
            None
        }
    }

    /// REST path reloaded for this target
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Holdings => "/v1/holdings",
            Self::Orders => "/v1/orders",
            Self::Positions => "/v1/positions",
        }
    }
}

/// Turns order updates into sticky notifications and refresh requests
pub struct OrderUpdateRelay {
    notifier: Arc<dyn Notifier>,
    route: RwLock<String>,
}

impl std::fmt::Debug for OrderUpdateRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderUpdateRelay")
            .field("route", &*self.route.read())
            .finish_non_exhaustive()
    }
}

impl OrderUpdateRelay {
    /// Relay reporting through `notifier`
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            route: RwLock::new(String::new()),
        }
    }

    /// Record the screen the user is on
    pub fn set_route(&self, route: impl Into<String>) {
        *self.route.write() = route.into();
    }

    /// Notify about `event`; returns the screen to reload, if any
    pub fn handle(&self, event: &OrderUpdateEvent) -> Option<RefreshTarget> {
        info!(order_id = %event.order_id, status = %event.status, "Order update received");
        self.notifier
            .notify(Notification::info("Order Update", event.summary()).sticky());
        RefreshTarget::for_route(&self.route.read())
    }

    /// Handle every update from `listener`, forwarding refresh requests
    ///
    /// Ends when the order bus closes or the refresh receiver is dropped.
    pub async fn run(
        &self,
        mut listener: Listener<OrderUpdateEvent>,
        refresh: mpsc::UnboundedSender<RefreshTarget>,
    ) {
        while let Some(event) = listener.recv().await {
            if let Some(target) = self.handle(&event) {
                if refresh.send(target).is_err() {
                    debug!("Refresh receiver dropped");
                    return;
                }
            }
        }
        debug!("Order update stream ended");
    }
}
