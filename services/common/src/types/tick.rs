//! Live tick records

use crate::event_bus::{BusMessage, Keyed};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque instrument identifier, the join key between reference rows and ticks
pub type InstrumentToken = u32;

/// One batch of ticks as pushed by the server, shared by every listener
pub type TickBatch = Arc<Vec<Tick>>;

/// Point-in-time market update for one instrument
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    /// Instrument this tick belongs to
    pub instrument_token: InstrumentToken,
    /// Last traded price
    #[serde(default)]
    pub last_traded_price: f64,
    /// Change versus previous close, in percent
    #[serde(default)]
    pub change: f64,
    /// Previous close
    #[serde(default)]
    pub close_price: f64,
    /// Session high
    #[serde(default)]
    pub high_price: f64,
    /// Session low
    #[serde(default)]
    pub low_price: f64,
    /// Whether the instrument is tradable (indices are not)
    #[serde(default)]
    pub tradable: bool,
    /// Contract lot size, for derivatives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_size: Option<u32>,
    /// Order-book snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_depth: Option<MarketDepth>,
}

impl Tick {
    /// Absolute change versus previous close
    #[must_use]
    pub fn change_abs(&self) -> f64 {
        self.change * self.close_price / 100.0
    }
}

/// Five-level order book
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketDepth {
    /// Bid levels, best first
    #[serde(default)]
    pub buy: Vec<DepthLevel>,
    /// Offer levels, best first
    #[serde(default)]
    pub sell: Vec<DepthLevel>,
}

/// One order-book level
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Price
    #[serde(default)]
    pub price: f64,
    /// Resting quantity
    #[serde(default)]
    pub quantity: i64,
    /// Number of orders
    #[serde(default)]
    pub orders: u32,
}

impl BusMessage for TickBatch {
    fn topic(&self) -> &str {
        "ticks"
    }
}

impl Keyed for TickBatch {
    type Key = InstrumentToken;

    fn narrow(&self, keys: &FxHashSet<InstrumentToken>) -> Option<Self> {
        let matching = self
            .iter()
            .filter(|t| keys.contains(&t.instrument_token))
            .count();
        if matching == 0 {
            None
        } else if matching == self.len() {
            Some(Arc::clone(self))
        } else {
            Some(Arc::new(
                self.iter()
                    .filter(|t| keys.contains(&t.instrument_token))
                    .cloned()
                    .collect(),
            ))
        }
    }
}
