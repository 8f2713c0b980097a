//! Inbound frame routing onto the fan-out buses

use services_common::stomp::{Command, Frame};
use services_common::{
    FanOutBus, OrderUpdateEvent, ServiceError, ServiceResult, Tick, TickBatch, ORDERS_QUEUE,
    ORDERS_SUBSCRIPTION_ID, TICKS_QUEUE, TICKS_SUBSCRIPTION_ID,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Inbound channel a MESSAGE frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Tick batches
    Ticks,
    /// Order status pushes
    Orders,
}

impl Route {
    /// Resolve by subscription id, falling back to the destination header
    #[must_use]
    pub fn of(frame: &Frame) -> Option<Self> {
        match frame.header("subscription") {
            Some(TICKS_SUBSCRIPTION_ID) => return Some(Self::Ticks),
            Some(ORDERS_SUBSCRIPTION_ID) => return Some(Self::Orders),
            _ => {}
        }
        match frame.header("destination") {
            Some(TICKS_QUEUE) => Some(Self::Ticks),
            Some(ORDERS_QUEUE) => Some(Self::Orders),
            _ => None,
        }
    }
}

/// Publishes decoded pushes on the tick and order buses
#[derive(Debug, Clone)]
pub struct FrameRouter {
    ticks: FanOutBus<TickBatch>,
    orders: FanOutBus<OrderUpdateEvent>,
}

impl FrameRouter {
    /// Router feeding `ticks` and `orders`
    #[must_use]
    pub const fn new(ticks: FanOutBus<TickBatch>, orders: FanOutBus<OrderUpdateEvent>) -> Self {
        Self { ticks, orders }
    }

    /// Handle one inbound frame
    ///
    /// Bodies that fail to decode are logged and skipped. An ERROR frame ends
    /// the session.
    pub fn route(&self, frame: &Frame) -> ServiceResult<()> {
        match frame.command {
            Command::Message => {
                self.route_message(frame);
                Ok(())
            }
            Command::Error => {
                let message = frame.header("message").unwrap_or("no message");
                Err(ServiceError::Protocol(format!(
                    "broker error: {message} {}",
                    frame.body.trim()
                )))
            }
            Command::Receipt => {
                debug!(receipt = ?frame.header("receipt-id"), "Receipt received");
                Ok(())
            }
            other => {
                trace!(command = %other, "Ignoring inbound frame");
                Ok(())
            }
        }
    }

    fn route_message(&self, frame: &Frame) {
        match Route::of(frame) {
            Some(Route::Ticks) => match serde_json::from_str::<Vec<Tick>>(&frame.body) {
                Ok(ticks) if ticks.is_empty() => trace!("Empty tick batch"),
                Ok(ticks) => {
                    let count = ticks.len();
                    let listeners = self.ticks.publish(Arc::new(ticks));
                    trace!(count, listeners, "Tick batch published");
                }
                Err(e) => warn!(error = %e, "Skipping unparseable tick batch"),
            },
            Some(Route::Orders) => match serde_json::from_str::<OrderUpdateEvent>(&frame.body) {
                Ok(event) => {
                    debug!(order_id = %event.order_id, status = %event.status, "Order update");
                    self.orders.publish(event);
                }
                Err(e) => warn!(error = %e, "Skipping unparseable order update"),
            },
            None => debug!(
                destination = ?frame.header("destination"),
                "Message for unknown destination"
            ),
        }
    }
}
