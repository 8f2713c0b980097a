//! Watchlist quotes

use super::{unique_tokens, TickReducer};
use services_common::{InstrumentToken, Tick, WatchlistInstrument};

/// Refresh one entry from `tick` when the traded price moved
pub fn apply_tick(instrument: &mut WatchlistInstrument, tick: &Tick) -> bool {
    if instrument.last_price == tick.last_traded_price {
        return false;
    }
    instrument.change = tick.change;
    instrument.change_abs = tick.change_abs();
    instrument.last_price = tick.last_traded_price;
    instrument.tradable = tick.tradable;
    true
}

/// One watchlist
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    name: String,
    instruments: Vec<WatchlistInstrument>,
}

impl Watchlist {
    /// Watchlist `name` holding `instruments`
    pub fn new(name: impl Into<String>, instruments: Vec<WatchlistInstrument>) -> Self {
        Self {
            name: name.into(),
            instruments,
        }
    }

    /// Name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries
    #[must_use]
    pub fn instruments(&self) -> &[WatchlistInstrument] {
        &self.instruments
    }

    /// Add an entry; `false` when the symbol is already listed on that exchange
    pub fn add(&mut self, instrument: WatchlistInstrument) -> bool {
        if self.position(&instrument.trading_symbol, &instrument.exchange).is_some() {
            return false;
        }
        self.instruments.push(instrument);
        true
    }

    /// Remove the entry for `trading_symbol` on `exchange`
    pub fn remove(&mut self, trading_symbol: &str, exchange: &str) -> Option<WatchlistInstrument> {
        let index = self.position(trading_symbol, exchange)?;
        Some(self.instruments.remove(index))
    }

    fn position(&self, trading_symbol: &str, exchange: &str) -> Option<usize> {
        self.instruments
            .iter()
            .position(|i| i.trading_symbol == trading_symbol && i.exchange == exchange)
    }
}

impl TickReducer for Watchlist {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        let mut changed = 0;
        for tick in ticks {
            for instrument in self
                .instruments
                .iter_mut()
                .filter(|i| i.instrument_token == tick.instrument_token)
            {
                if apply_tick(instrument, tick) {
                    changed += 1;
                }
            }
        }
        changed
    }

    fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        unique_tokens(self.instruments.iter().map(|i| i.instrument_token))
    }
}
