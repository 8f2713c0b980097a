//! Basket order draft
//!
//! Up to six instruments staged for placement as one basket. Live ticks fill
//! in the price of LIMIT items that have not been priced yet.

use super::{unique_tokens, TickReducer};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use services_common::{
    BasketItem, BasketMargin, BasketMarginRequest, InstrumentToken, MarginCalculationParams,
    OrderParams, OrderRequest, OrderType, Tick, TransactionType, WatchlistInstrument,
};
use thiserror::Error;

/// Most instruments a basket may hold
pub const MAX_BASKET_ITEMS: usize = 6;

/// Tag attached to orders placed from the basket
pub const BASKET_ORDER_TAG: &str = "famvest-basket-order";

const DERIVATIVE_SEGMENTS: [&str; 4] = ["NFO-OPT", "NFO-FUT", "BFO-OPT", "BFO-FUT"];

/// Why a basket cannot be placed or extended
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BasketValidationError {
    /// Nothing staged
    #[error("Please add at least one instrument to the basket")]
    Empty,
    /// No trading account chosen
    #[error("Please select a trading account")]
    NoAccount,
    /// Item without symbol or exchange
    #[error("All instruments must have valid trading symbol and exchange")]
    MissingSymbol,
    /// Non-positive quantity
    #[error("Quantity must be greater than 0 for {0}")]
    InvalidQuantity(String),
    /// LIMIT item without a price
    #[error("Price must be greater than 0 for LIMIT order on {0}")]
    InvalidPrice(String),
    /// Basket already full
    #[error("Maximum 6 instruments allowed in basket")]
    LimitReached,
}

/// Product type for an item: MIS intraday, NRML for F&O, CNC otherwise
#[must_use]
pub fn product_type(item: &BasketItem) -> &'static str {
    if item.is_intraday {
        "MIS"
    } else if DERIVATIVE_SEGMENTS.contains(&item.segment.as_str()) {
        "NRML"
    } else {
        "CNC"
    }
}

/// `amo` outside 09:00 to 15:30 on weekdays, `regular` otherwise
#[must_use]
pub fn default_variety(now: NaiveDateTime) -> &'static str {
    let open = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN);
    let close = NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN);
    let weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    let time = now.time();
    if weekend || time < open || time > close {
        "amo"
    } else {
        "regular"
    }
}

/// Basket screen state
#[derive(Debug, Clone, Default)]
pub struct BasketDraft {
    account_id: String,
    items: Vec<BasketItem>,
    is_intraday: bool,
    recalc_pending: bool,
    required_margin: f64,
    final_margin: f64,
}

impl BasketDraft {
    /// Empty basket for `account_id`
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    /// Basket restored from saved items; intraday follows the first item
    pub fn from_items(account_id: impl Into<String>, items: Vec<BasketItem>) -> Self {
        let is_intraday = items.first().is_some_and(|i| i.is_intraday);
        Self {
            account_id: account_id.into(),
            items,
            is_intraday,
            recalc_pending: true,
            ..Self::default()
        }
    }

    /// Trading account
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Change the trading account
    pub fn set_account(&mut self, account_id: impl Into<String>) {
        self.account_id = account_id.into();
        self.recalc_pending = true;
    }

    /// Staged items
    #[must_use]
    pub fn items(&self) -> &[BasketItem] {
        &self.items
    }

    /// Intraday flag applied to every item
    #[must_use]
    pub const fn is_intraday(&self) -> bool {
        self.is_intraday
    }

    /// Stage `instrument` as a SELL LIMIT item of `quantity`
    pub fn add_item(
        &mut self,
        instrument: &WatchlistInstrument,
        quantity: i64,
    ) -> Result<InstrumentToken, BasketValidationError> {
        if self.items.len() >= MAX_BASKET_ITEMS {
            return Err(BasketValidationError::LimitReached);
        }
        let mut item = BasketItem {
            display_name: instrument.display_name.clone(),
            trading_symbol: instrument.trading_symbol.clone(),
            instrument_token: instrument.instrument_token,
            segment: instrument.segment.clone(),
            exchange: instrument.exchange.clone(),
            quantity,
            order_type: OrderType::Limit,
            transaction_type: TransactionType::Sell,
            is_intraday: self.is_intraday,
            ..BasketItem::default()
        };
        item.product_type = product_type(&item).to_string();
        self.items.push(item);
        self.recalc_pending = true;
        Ok(instrument.instrument_token)
    }

    /// Remove the item at `index`
    pub fn remove(&mut self, index: usize) -> Option<BasketItem> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.recalc_pending = !self.items.is_empty();
        Some(item)
    }

    /// Remove everything
    pub fn clear(&mut self) -> Vec<BasketItem> {
        self.recalc_pending = false;
        std::mem::take(&mut self.items)
    }

    /// Flip BUY/SELL of the item at `index`
    pub fn toggle_transaction_type(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            item.transaction_type = item.transaction_type.flipped();
            self.recalc_pending = true;
        }
    }

    /// Switch between MARKET and LIMIT; MARKET resets the price
    pub fn toggle_order_type(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            match item.order_type {
                OrderType::Market => item.order_type = OrderType::Limit,
                OrderType::Limit => {
                    item.order_type = OrderType::Market;
                    item.price = 0.0;
                }
                OrderType::StopLoss | OrderType::StopLossMarket => return,
            }
            self.recalc_pending = true;
        }
    }

    /// Set the quantity, at least 1; returns the value applied
    pub fn set_quantity(&mut self, index: usize, quantity: i64) -> Option<i64> {
        let item = self.items.get_mut(index)?;
        item.quantity = quantity.max(1);
        self.recalc_pending = true;
        Some(item.quantity)
    }

    /// Set the limit price, at least 0
    pub fn set_price(&mut self, index: usize, price: f64) {
        if let Some(item) = self.items.get_mut(index) {
            item.price = price.max(0.0);
            self.recalc_pending = true;
        }
    }

    /// Apply the intraday flag to every item
    pub fn set_intraday(&mut self, intraday: bool) {
        self.is_intraday = intraday;
        for item in &mut self.items {
            item.is_intraday = intraday;
            item.product_type = product_type(item).to_string();
        }
        self.recalc_pending = true;
    }

    /// BUY premium minus SELL premium
    #[must_use]
    pub fn net_premium(&self) -> f64 {
        self.items.iter().fold(0.0, |total, item| {
            let premium = item.quantity as f64 * item.price;
            match item.transaction_type {
                TransactionType::Buy => total + premium,
                TransactionType::Sell => total - premium,
            }
        })
    }

    /// Whether margin must be recalculated; clears the flag
    pub fn take_recalc(&mut self) -> bool {
        std::mem::take(&mut self.recalc_pending)
    }

    /// Combined margin request for the staged items
    ///
    /// `None` when the basket is empty or no account is selected.
    #[must_use]
    pub fn margin_request(&self, include_existing_positions: bool) -> Option<BasketMarginRequest> {
        if self.items.is_empty() || self.account_id.trim().is_empty() {
            return None;
        }
        let margin_calculation_params = self
            .items
            .iter()
            .map(|item| MarginCalculationParams {
                exchange: item.exchange.clone(),
                trading_symbol: item.trading_symbol.clone(),
                transaction_type: item.transaction_type,
                variety: "regular".to_string(),
                product: product_type(item).to_string(),
                order_type: item.order_type,
                quantity: item.quantity,
                price: if item.order_type == OrderType::Market {
                    0.0
                } else {
                    item.price
                },
            })
            .collect();
        Some(BasketMarginRequest {
            trading_account_id: self.account_id.clone(),
            include_existing_positions,
            margin_calculation_params,
        })
    }

    /// Store a margin reply: per-item margins in order, then the totals
    ///
    /// A negative final margin is shown as zero.
    pub fn apply_margin(&mut self, margin: &BasketMargin) {
        for (item, leg) in self.items.iter_mut().zip(&margin.orders) {
            item.margin_required = leg.total;
        }
        self.required_margin = margin.initial_margin.total;
        self.final_margin = margin.final_margin.total.max(0.0);
    }

    /// Margin before spread benefit
    #[must_use]
    pub const fn required_margin(&self) -> f64 {
        self.required_margin
    }

    /// Margin after spread benefit
    #[must_use]
    pub const fn final_margin(&self) -> f64 {
        self.final_margin
    }

    /// Check the basket can be placed
    pub fn validate(&self) -> Result<(), BasketValidationError> {
        if self.items.is_empty() {
            return Err(BasketValidationError::Empty);
        }
        if self.account_id.trim().is_empty() {
            return Err(BasketValidationError::NoAccount);
        }
        for item in &self.items {
            if item.trading_symbol.is_empty() || item.exchange.is_empty() {
                return Err(BasketValidationError::MissingSymbol);
            }
            if item.quantity <= 0 {
                return Err(BasketValidationError::InvalidQuantity(
                    item.display_name.clone(),
                ));
            }
            if item.order_type == OrderType::Limit && item.price <= 0.0 {
                return Err(BasketValidationError::InvalidPrice(item.display_name.clone()));
            }
        }
        Ok(())
    }

    /// One placement request per item, after validation
    pub fn order_requests(&self) -> Result<Vec<OrderRequest>, BasketValidationError> {
        self.validate()?;
        Ok(self
            .items
            .iter()
            .map(|item| OrderRequest {
                trading_account_id: self.account_id.clone(),
                order_params: OrderParams {
                    quantity: item.quantity,
                    order_type: item.order_type,
                    trading_symbol: item.trading_symbol.clone(),
                    product: product_type(item).to_string(),
                    exchange: item.exchange.clone(),
                    transaction_type: item.transaction_type,
                    validity: "DAY".to_string(),
                    price: if item.order_type == OrderType::Market {
                        0.0
                    } else {
                        item.price
                    },
                    trigger_price: 0.0,
                    tag: BASKET_ORDER_TAG.to_string(),
                },
            })
            .collect())
    }
}

/// Refresh one item from `tick`; returns (changed, price filled from this tick)
pub fn apply_tick(item: &mut BasketItem, tick: &Tick) -> (bool, bool) {
    let ltp = tick.last_traded_price;
    if item.last_price == ltp {
        return (false, false);
    }
    item.last_price = ltp;
    item.change = tick.change;

    let priced = !item.price_updated && item.order_type == OrderType::Limit && ltp > 0.0;
    if priced {
        item.price = ltp;
        item.price_updated = true;
    }
    (true, priced)
}

impl TickReducer for BasketDraft {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        let mut changed = 0;
        for tick in ticks {
            for item in self
                .items
                .iter_mut()
                .filter(|i| i.instrument_token == tick.instrument_token)
            {
                let (updated, priced) = apply_tick(item, tick);
                if updated {
                    changed += 1;
                }
                if priced {
                    self.recalc_pending = true;
                }
            }
        }
        changed
    }

    fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        unique_tokens(self.items.iter().map(|i| i.instrument_token))
    }
}
