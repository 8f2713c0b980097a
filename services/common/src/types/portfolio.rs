//! Portfolio rows joined with live ticks
//!
//! Each row pairs static reference fields from the REST API with the
//! live-priced fields recomputed on every matching tick.

use super::lenient::string_or_number;
use super::tick::InstrumentToken;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Equity holding of one trading account
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Holding {
    /// Owning trading account
    pub user_id: String,
    /// Instrument
    pub instrument_token: InstrumentToken,
    /// Trading symbol
    pub trading_symbol: String,
    /// Exchange
    pub exchange: String,
    /// Quantity held
    pub quantity: i64,
    /// Average buy price
    pub average_price: f64,
    /// Amount invested, as reported by the backend
    pub invested_amount: f64,
    /// Last traded price
    pub last_price: f64,
    /// quantity * last price
    pub current_value: f64,
    /// Current value minus investment
    pub net_pnl: f64,
    /// Net P&L over investment, in percent
    pub net_change_percentage: f64,
    /// Change versus previous close, in percent
    pub day_change_percentage: f64,
    /// P&L since previous close
    pub day_pnl: f64,
}

impl Holding {
    /// Invested amount, falling back to quantity * average price
    #[must_use]
    pub fn invested(&self) -> f64 {
        if self.invested_amount == 0.0 {
            self.quantity as f64 * self.average_price
        } else {
            self.invested_amount
        }
    }
}

/// Position row as returned by `/v1/positions`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionDetails {
    /// Owning trading account
    pub user_id: String,
    /// Instrument, absent for rows the backend could not resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_token: Option<InstrumentToken>,
    /// Display name
    pub display_name: String,
    /// P&L since the reference price
    pub day_pnl: f64,
    /// Broker position
    pub position: Position,
}

/// Broker position fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Position {
    /// Trading symbol
    pub trading_symbol: String,
    /// Exchange
    pub exchange: String,
    /// NRML, CNC or MIS
    pub product: String,
    /// Net open quantity; negative when short
    pub net_quantity: i64,
    /// Total bought quantity
    pub buy_quantity: i64,
    /// Total sold quantity
    pub sell_quantity: i64,
    /// Quantity bought today
    pub day_buy_quantity: i64,
    /// Quantity sold today
    pub day_sell_quantity: i64,
    /// Average buy price
    pub buy_price: f64,
    /// Average sell price
    pub sell_price: f64,
    /// Total buy value
    pub buy_value: f64,
    /// Total sell value
    pub sell_value: f64,
    /// Realised plus unrealised P&L
    pub pnl: f64,
    /// Last traded price
    pub last_price: f64,
    /// Change versus previous close, in percent
    pub change: f64,
}

/// Order row as returned by `/v1/orders`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderDetails {
    /// Family member the trading account belongs to
    pub user_id: String,
    /// Instrument, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_token: Option<InstrumentToken>,
    /// Display name
    pub display_name: String,
    /// Last traded price
    pub last_price: f64,
    /// Change versus previous close, in percent
    pub change: f64,
    /// Broker order
    pub order: Order,
}

/// Broker order fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    /// Trading account
    pub account_id: String,
    /// Broker order id
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    /// regular, amo, co, iceberg
    pub order_variety: String,
    /// Order status
    pub status: String,
    /// Trading symbol
    pub trading_symbol: String,
    /// Exchange
    pub exchange: String,
    /// BUY or SELL
    pub transaction_type: String,
    /// Product type
    pub product: String,
    /// Quantity
    pub quantity: i64,
    /// Limit price
    pub price: f64,
}

/// Order type of a basket item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderType {
    /// Market order
    #[serde(rename = "MARKET")]
    Market,
    /// Limit order
    #[default]
    #[serde(rename = "LIMIT")]
    Limit,
    /// Stop-loss limit
    #[serde(rename = "SL")]
    StopLoss,
    /// Stop-loss market
    #[serde(rename = "SL-M")]
    StopLossMarket,
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Buy
    Buy,
    /// Sell
    #[default]
    Sell,
}

impl TransactionType {
    /// The other side
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        })
    }
}

/// Instrument staged in the basket order draft
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasketItem {
    /// Display name
    pub display_name: String,
    /// Trading symbol
    pub trading_symbol: String,
    /// Instrument
    pub instrument_token: InstrumentToken,
    /// Segment, e.g. NFO-OPT
    pub segment: String,
    /// Exchange
    pub exchange: String,
    /// Quantity
    pub quantity: i64,
    /// Order type
    pub order_type: OrderType,
    /// Side
    pub transaction_type: TransactionType,
    /// Limit price; 0 until priced
    pub price: f64,
    /// Margin reported by the backend
    pub margin_required: f64,
    /// Last traded price
    pub last_price: f64,
    /// Change versus previous close, in percent
    pub change: f64,
    /// Price has been filled from the first live tick
    pub price_updated: bool,
    /// Intraday (MIS) order
    pub is_intraday: bool,
    /// Derived product type
    pub product_type: String,
}

/// Watchlist entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchlistInstrument {
    /// Instrument
    pub instrument_token: InstrumentToken,
    /// Trading symbol
    pub trading_symbol: String,
    /// Display name
    pub display_name: String,
    /// Exchange
    pub exchange: String,
    /// Segment
    pub segment: String,
    /// Last traded price
    pub last_price: f64,
    /// Change versus previous close, in percent
    pub change: f64,
    /// Absolute change versus previous close
    pub change_abs: f64,
    /// Tradable flag from the last tick
    pub tradable: bool,
}

/// Index quote shown in the header ticker
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexTicker {
    /// Index name
    pub symbol: String,
    /// Instrument
    pub instrument_token: InstrumentToken,
    /// Last traded price
    pub last_traded_price: f64,
    /// Absolute change versus previous close
    pub change: f64,
    /// Change in percent
    pub percent_change: f64,
}

impl IndexTicker {
    /// Ticker for `symbol` with no price yet
    pub fn new(symbol: impl Into<String>, instrument_token: InstrumentToken) -> Self {
        Self {
            symbol: symbol.into(),
            instrument_token,
            ..Self::default()
        }
    }

    /// Indices shown by default: NIFTY 50 and SENSEX
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![Self::new("NIFTY 50", 256_265), Self::new("SENSEX", 265)]
    }
}
