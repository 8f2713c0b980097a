//! Header index ticker and feed health

use super::{unique_tokens, TickReducer};
use serde::{Deserialize, Serialize};
use services_common::{
    IndexTicker, InstrumentToken, Tick, FEED_DISCONNECT_THRESHOLD_MS, FEED_IDLE_THRESHOLD_MS,
};
use std::time::{Duration, Instant};

/// Health of the live feed as seen from the index ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Values are moving
    Live,
    /// Ticks arrive but nothing changed recently
    Idle,
    /// No tick recently, or ever
    Disconnected,
}

/// Index quotes shown in the header
#[derive(Debug, Clone)]
pub struct IndexTickerBoard {
    tickers: Vec<IndexTicker>,
    last_feed: Option<Instant>,
    last_change: Option<Instant>,
}

impl Default for IndexTickerBoard {
    fn default() -> Self {
        Self::new(IndexTicker::defaults())
    }
}

impl IndexTickerBoard {
    /// Board over `tickers`
    #[must_use]
    pub const fn new(tickers: Vec<IndexTicker>) -> Self {
        Self {
            tickers,
            last_feed: None,
            last_change: None,
        }
    }

    /// Tickers
    #[must_use]
    pub fn tickers(&self) -> &[IndexTicker] {
        &self.tickers
    }

    /// Apply a batch received at `now`
    ///
    /// Every batch counts as feed activity. Only a moved price counts as a
    /// change.
    pub fn apply_ticks_at(&mut self, ticks: &[Tick], now: Instant) -> usize {
        let mut changed = 0;
        for tick in ticks {
            self.last_feed = Some(now);
            for ticker in self
                .tickers
                .iter_mut()
                .filter(|t| t.instrument_token == tick.instrument_token)
            {
                if ticker.last_traded_price == tick.last_traded_price {
                    continue;
                }
                ticker.last_traded_price = tick.last_traded_price;
                ticker.change = tick.last_traded_price - tick.close_price;
                ticker.percent_change = tick.change;
                self.last_change = Some(now);
                changed += 1;
            }
        }
        changed
    }

    /// Feed health at `now`
    #[must_use]
    pub fn feed_status_at(&self, now: Instant) -> FeedStatus {
        let Some(last_feed) = self.last_feed else {
            return FeedStatus::Disconnected;
        };
        if now.saturating_duration_since(last_feed)
            > Duration::from_millis(FEED_DISCONNECT_THRESHOLD_MS)
        {
            return FeedStatus::Disconnected;
        }
        let idle = self.last_change.is_none_or(|changed| {
            now.saturating_duration_since(changed) > Duration::from_millis(FEED_IDLE_THRESHOLD_MS)
        });
        if idle { FeedStatus::Idle } else { FeedStatus::Live }
    }

    /// Feed health now
    #[must_use]
    pub fn feed_status(&self) -> FeedStatus {
        self.feed_status_at(Instant::now())
    }
}

impl TickReducer for IndexTickerBoard {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        self.apply_ticks_at(ticks, Instant::now())
    }

    fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        unique_tokens(self.tickers.iter().map(|t| t.instrument_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nifty(ltp: f64) -> Tick {
        Tick {
            instrument_token: 256_265,
            last_traded_price: ltp,
            close_price: 24_000.0,
            change: 0.5,
            ..Tick::default()
        }
    }

    #[test]
    fn test_change_is_absolute() {
        let mut board = IndexTickerBoard::default();
        assert_eq!(board.apply_ticks_at(&[nifty(24_120.0)], Instant::now()), 1);

        let ticker = &board.tickers()[0];
        assert_eq!(ticker.change, 120.0);
        assert_eq!(ticker.percent_change, 0.5);
    }

    #[test]
    fn test_feed_status_transitions() {
        let start = Instant::now();
        let mut board = IndexTickerBoard::default();
        assert_eq!(board.feed_status_at(start), FeedStatus::Disconnected);

        board.apply_ticks_at(&[nifty(24_100.0)], start);
        assert_eq!(board.feed_status_at(start + Duration::from_secs(1)), FeedStatus::Live);

        board.apply_ticks_at(&[nifty(24_100.0)], start + Duration::from_secs(4));
        assert_eq!(board.feed_status_at(start + Duration::from_secs(6)), FeedStatus::Idle);
        assert_eq!(
            board.feed_status_at(start + Duration::from_secs(65)),
            FeedStatus::Disconnected
        );
    }

    #[test]
    fn test_unrelated_ticks_keep_feed_alive() {
        let start = Instant::now();
        let mut board = IndexTickerBoard::default();
        let other = Tick {
            instrument_token: 1,
            ..Tick::default()
        };
        board.apply_ticks_at(&[other], start);
        assert_eq!(board.feed_status_at(start), FeedStatus::Idle);
    }
}
