//! Order-book depth of a single instrument

use super::{percent_of, TickReducer};
use services_common::{DepthLevel, InstrumentToken, MarketDepth, Tick};

const DEFAULT_DEPTH_LEVELS: usize = 5;

/// Depth panel state
#[derive(Debug, Clone)]
pub struct MarketDepthView {
    instrument_token: InstrumentToken,
    tick: Option<Tick>,
    depth: MarketDepth,
    levels: usize,
    max_bid_quantity: i64,
    max_offer_quantity: i64,
    summary_collapsed: bool,
}

impl MarketDepthView {
    /// Empty five-level view for `instrument_token`
    #[must_use]
    pub fn new(instrument_token: InstrumentToken) -> Self {
        let empty = vec![DepthLevel::default(); DEFAULT_DEPTH_LEVELS];
        Self {
            instrument_token,
            tick: None,
            depth: MarketDepth {
                buy: empty.clone(),
                sell: empty,
            },
            levels: DEFAULT_DEPTH_LEVELS,
            max_bid_quantity: 0,
            max_offer_quantity: 0,
            summary_collapsed: true,
        }
    }

    /// Instrument shown
    #[must_use]
    pub const fn instrument_token(&self) -> InstrumentToken {
        self.instrument_token
    }

    /// Latest tick
    #[must_use]
    pub const fn tick(&self) -> Option<&Tick> {
        self.tick.as_ref()
    }

    /// Latest book
    #[must_use]
    pub const fn depth(&self) -> &MarketDepth {
        &self.depth
    }

    /// Rows to display: the shorter of the two sides
    #[must_use]
    pub const fn levels(&self) -> usize {
        self.levels
    }

    /// Largest bid quantity in the book
    #[must_use]
    pub const fn max_bid_quantity(&self) -> i64 {
        self.max_bid_quantity
    }

    /// Largest offer quantity in the book
    #[must_use]
    pub const fn max_offer_quantity(&self) -> i64 {
        self.max_offer_quantity
    }

    /// Summary panel collapsed; non-tradable instruments expand it
    #[must_use]
    pub const fn summary_collapsed(&self) -> bool {
        self.summary_collapsed
    }

    /// Where `price` sits within the day's low-high range, in percent
    #[must_use]
    pub fn range_position(&self, price: f64) -> Option<f64> {
        let tick = self.tick.as_ref()?;
        let range = tick.high_price - tick.low_price;
        (range > 0.0).then(|| percent_of(price - tick.low_price, range))
    }

    fn apply(&mut self, tick: &Tick) {
        self.tick = Some(tick.clone());
        if tick.tradable {
            let depth = tick.market_depth.clone().unwrap_or_default();
            self.levels = depth.buy.len().min(depth.sell.len());
            self.max_bid_quantity = depth.buy.iter().map(|l| l.quantity).max().unwrap_or(0);
            self.max_offer_quantity = depth.sell.iter().map(|l| l.quantity).max().unwrap_or(0);
            self.depth = depth;
        } else {
            self.summary_collapsed = false;
        }
    }
}

impl TickReducer for MarketDepthView {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        let token = self.instrument_token;
        let mut changed = 0;
        for tick in ticks.iter().filter(|t| t.instrument_token == token) {
            if self.tick.as_ref() != Some(tick) {
                self.apply(tick);
                changed += 1;
            }
        }
        changed
    }

    fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        vec![self.instrument_token]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64, quantity: i64) -> DepthLevel {
        DepthLevel {
            price,
            quantity,
            orders: 1,
        }
    }

    #[test]
    fn test_tradable_tick_replaces_book() {
        let mut view = MarketDepthView::new(408_065);
        assert_eq!(view.levels(), 5);

        let tick = Tick {
            instrument_token: 408_065,
            tradable: true,
            high_price: 110.0,
            low_price: 90.0,
            market_depth: Some(MarketDepth {
                buy: vec![level(99.0, 10), level(98.0, 40), level(97.0, 5)],
                sell: vec![level(100.0, 25), level(101.0, 15)],
            }),
            ..Tick::default()
        };
        assert_eq!(view.apply_ticks(&[tick.clone()]), 1);
        assert_eq!(view.apply_ticks(&[tick]), 0);

        assert_eq!(view.levels(), 2);
        assert_eq!(view.max_bid_quantity(), 40);
        assert_eq!(view.max_offer_quantity(), 25);
        assert!(view.summary_collapsed());
        assert_eq!(view.range_position(100.0), Some(50.0));
    }

    #[test]
    fn test_index_tick_expands_summary() {
        let mut view = MarketDepthView::new(256_265);
        view.apply_ticks(&[Tick {
            instrument_token: 256_265,
            last_traded_price: 24_000.0,
            ..Tick::default()
        }]);
        assert!(!view.summary_collapsed());
        assert_eq!(view.levels(), 5);
    }
}
