//! Per-view recomputation of derived metrics from live ticks
//!
//! Each view owns its rows and a reducer that folds tick batches into them.
//! Reducers only touch rows whose instrument token matches a tick and are
//! idempotent: applying the same tick twice changes nothing the second time.

pub mod basket;
pub mod holdings;
pub mod index_ticker;
pub mod market_depth;
pub mod orders;
pub mod positions;
pub mod watchlist;

pub use basket::{BasketDraft, BasketValidationError};
pub use holdings::{HoldingsBook, HoldingsSummary};
pub use index_ticker::{FeedStatus, IndexTickerBoard};
pub use market_depth::MarketDepthView;
pub use orders::OrdersBook;
pub use positions::{PositionsBook, PositionsSummary};
pub use watchlist::Watchlist;

use services_common::{InstrumentToken, Tick};

/// Folds tick batches into a view's rows
pub trait TickReducer {
    /// Apply a batch; returns how many rows changed
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize;

    /// Tokens this view needs ticks for
    fn instrument_tokens(&self) -> Vec<InstrumentToken>;
}

/// `numerator / denominator * 100`, 0 when the denominator is 0
#[must_use]
pub(crate) fn percent_of(numerator: f64, denominator: f64) -> f64 {
    ratio_of(numerator, denominator) * 100.0
}

/// `numerator / denominator`, 0 when the result is not finite
#[must_use]
pub(crate) fn ratio_of(numerator: f64, denominator: f64) -> f64 {
    let ratio = numerator / denominator;
    if ratio.is_finite() { ratio } else { 0.0 }
}

/// Sorted, de-duplicated token list
pub(crate) fn unique_tokens<I>(tokens: I) -> Vec<InstrumentToken>
where
    I: IntoIterator<Item = InstrumentToken>,
{
    let mut tokens: Vec<_> = tokens.into_iter().collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}
