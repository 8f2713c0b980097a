//! Order-status push events

use super::lenient::{f64_or_string, string_or_number};
use super::portfolio::{OrderType, TransactionType};
use crate::event_bus::BusMessage;
use serde::{Deserialize, Serialize};

/// Order status change pushed on the per-user order queue
///
/// Field names follow the broker's snake_case payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdateEvent {
    /// Trading account the order belongs to
    #[serde(rename = "user_id", default, deserialize_with = "string_or_number")]
    pub account_id: String,
    /// BUY or SELL
    #[serde(default)]
    pub transaction_type: String,
    /// Order quantity
    #[serde(default)]
    pub quantity: i64,
    /// Order price
    #[serde(default, deserialize_with = "f64_or_string")]
    pub price: f64,
    /// New order status
    #[serde(default)]
    pub status: String,
    /// Broker order id
    #[serde(default, deserialize_with = "string_or_number")]
    pub order_id: String,
    /// Trading symbol, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradingsymbol: Option<String>,
}

impl OrderUpdateEvent {
    /// Text shown to the user for this event
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Account ID:{}. {} order with quantity {} and price {} is {}. Order ID:{}.",
            self.account_id,
            self.transaction_type,
            self.quantity,
            self.price,
            self.status,
            self.order_id
        )
    }
}

impl BusMessage for OrderUpdateEvent {
    fn topic(&self) -> &str {
        "orders"
    }
}

/// Order placement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Account placing the order
    pub trading_account_id: String,
    /// Broker order parameters
    pub order_params: OrderParams,
}

/// Broker order parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderParams {
    /// Quantity
    pub quantity: i64,
    /// Order type
    pub order_type: OrderType,
    /// Trading symbol, spelled as the broker expects
    #[serde(rename = "tradingsymbol")]
    pub trading_symbol: String,
    /// NRML, CNC or MIS
    pub product: String,
    /// Exchange
    pub exchange: String,
    /// Side
    pub transaction_type: TransactionType,
    /// DAY or IOC
    pub validity: String,
    /// Limit price; 0 for market orders
    pub price: f64,
    /// Trigger price; 0 when unused
    pub trigger_price: f64,
    /// Free-form tag identifying the originating screen
    pub tag: String,
}

/// Reply to a successful placement
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacedOrder {
    /// Broker order id
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    /// Trading symbol, when echoed back
    pub trading_symbol: String,
}

/// One leg of a margin calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginCalculationParams {
    /// Exchange
    pub exchange: String,
    /// Trading symbol
    pub trading_symbol: String,
    /// Side
    pub transaction_type: TransactionType,
    /// Order variety
    pub variety: String,
    /// NRML, CNC or MIS
    pub product: String,
    /// Order type
    pub order_type: OrderType,
    /// Quantity
    pub quantity: i64,
    /// Limit price; 0 for market orders
    pub price: f64,
}

/// Combined margin request for a whole basket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketMarginRequest {
    /// Account the basket would be placed from
    pub trading_account_id: String,
    /// Count margin already blocked by open positions
    pub include_existing_positions: bool,
    /// Basket legs in basket order
    pub margin_calculation_params: Vec<MarginCalculationParams>,
}

/// Total of one margin figure
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginTotal {
    /// Amount in rupees
    #[serde(deserialize_with = "f64_or_string")]
    pub total: f64,
}

/// Backend reply to a combined margin request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasketMargin {
    /// Per-leg margins, in request order
    pub orders: Vec<MarginTotal>,
    /// Margin before spread benefit
    pub initial_margin: MarginTotal,
    /// Margin after spread benefit
    pub final_margin: MarginTotal,
}
