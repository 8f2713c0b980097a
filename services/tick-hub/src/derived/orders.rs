//! Live prices on the orders screen

use super::{unique_tokens, TickReducer};
use services_common::{InstrumentToken, OrderDetails, Tick, PENDING_ORDER_STATUSES};

/// Refresh last price and change of one order row
pub fn apply_tick(details: &mut OrderDetails, tick: &Tick) -> bool {
    if details.last_price == tick.last_traded_price && details.change == tick.change {
        return false;
    }
    details.last_price = tick.last_traded_price;
    details.change = tick.change;
    true
}

/// Whether the order still rests with the broker
#[must_use]
pub fn is_pending(details: &OrderDetails) -> bool {
    PENDING_ORDER_STATUSES.contains(&details.order.status.as_str())
}

/// Orders screen state
#[derive(Debug, Clone, Default)]
pub struct OrdersBook {
    orders: Vec<OrderDetails>,
}

impl OrdersBook {
    /// Book over `orders`
    #[must_use]
    pub const fn new(orders: Vec<OrderDetails>) -> Self {
        Self { orders }
    }

    /// Rows
    #[must_use]
    pub fn orders(&self) -> &[OrderDetails] {
        &self.orders
    }

    /// Rows still open at the broker
    pub fn pending(&self) -> impl Iterator<Item = &OrderDetails> {
        self.orders.iter().filter(|o| is_pending(o))
    }
}

impl TickReducer for OrdersBook {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        let mut changed = 0;
        for tick in ticks {
            for details in self
                .orders
                .iter_mut()
                .filter(|o| o.instrument_token == Some(tick.instrument_token))
            {
                if apply_tick(details, tick) {
                    changed += 1;
                }
            }
        }
        changed
    }

    fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        unique_tokens(self.orders.iter().filter_map(|o| o.instrument_token))
    }
}
