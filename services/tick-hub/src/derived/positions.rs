//! Position P&L

use super::{percent_of, unique_tokens, TickReducer};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use services_common::{InstrumentToken, Position, PositionDetails, Tick, PRODUCT_NRML};

/// Reference price and change used for the day P&L
///
/// A position opened entirely today is measured from its own average
/// execution price, everything else from the previous close.
fn day_reference(position: &Position, tick: &Tick) -> (f64, f64) {
    let ltp = tick.last_traded_price;
    if -position.day_sell_quantity == position.net_quantity {
        let closing = position.sell_price;
        (closing, percent_of(ltp - closing, closing))
    } else if position.day_buy_quantity == position.net_quantity {
        let closing = position.buy_price;
        (closing, percent_of(ltp - closing, closing))
    } else {
        (tick.close_price, tick.change)
    }
}

/// Realised plus unrealised P&L at `ltp`; `None` for a flat position
#[must_use]
pub fn position_pnl(position: &Position, ltp: f64) -> Option<f64> {
    let net = position.net_quantity;
    let (buy, sell) = (position.buy_price, position.sell_price);
    if net < 0 {
        let realised = (sell - buy) * position.buy_quantity as f64;
        let unrealised = (sell - ltp) * (-net) as f64;
        Some(realised + unrealised)
    } else if net > 0 {
        let realised = (sell - buy) * position.sell_quantity as f64;
        let unrealised = (ltp - buy) * net as f64;
        Some(realised + unrealised)
    } else {
        None
    }
}

/// Update one position row from `tick`
///
/// Change and day P&L follow every tick. Last price and P&L only move when
/// the traded price does. Returns whether anything changed.
pub fn apply_tick(details: &mut PositionDetails, tick: &Tick) -> bool {
    let before_change = details.position.change;
    let before_day_pnl = details.day_pnl;

    details.position.change = tick.change;
    let (closing, change) = day_reference(&details.position, tick);
    details.day_pnl = change * (details.position.net_quantity as f64 * closing) / 100.0;

    let mut changed = before_change != details.position.change || before_day_pnl != details.day_pnl;

    let ltp = tick.last_traded_price;
    if details.position.last_price != ltp {
        details.position.last_price = ltp;
        if let Some(pnl) = position_pnl(&details.position, ltp) {
            details.position.pnl = pnl;
        }
        changed = true;
    }
    changed
}

/// Totals over the NRML positions of a set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsSummary {
    /// Account the totals belong to; empty for the overall summary
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub user_id: String,
    /// Sum of day P&L
    #[serde(rename = "daysPnL")]
    pub days_pnl: f64,
    /// Sum of P&L
    #[serde(rename = "totalPnL")]
    pub total_pnl: f64,
    /// Sum of sell value minus buy value
    pub max_profit: f64,
    /// Max profit minus current P&L
    pub profit_left: f64,
    /// Positions with a non-zero net quantity
    pub open_positions: usize,
    /// Largest single P&L, floored at 0
    pub max_single_profit: f64,
    /// Smallest single P&L, capped at 0
    pub max_loss: f64,
}

impl PositionsSummary {
    /// Summarise the NRML rows of `positions`
    pub fn over<'a, I>(positions: I) -> Self
    where
        I: IntoIterator<Item = &'a PositionDetails>,
    {
        let mut summary = Self::default();
        for details in positions
            .into_iter()
            .filter(|d| d.position.product == PRODUCT_NRML)
        {
            let position = &details.position;
            if position.net_quantity != 0 {
                summary.open_positions += 1;
            }
            summary.days_pnl += details.day_pnl;
            summary.total_pnl += position.pnl;
            summary.max_profit += position.sell_value - position.buy_value;
            summary.max_single_profit = summary.max_single_profit.max(position.pnl);
            summary.max_loss = summary.max_loss.min(position.pnl);
        }
        summary.profit_left = summary.max_profit - summary.total_pnl;
        summary
    }
}

/// Positions screen state
#[derive(Debug, Clone, Default)]
pub struct PositionsBook {
    positions: Vec<PositionDetails>,
    summary: PositionsSummary,
    groups: Vec<PositionsSummary>,
}

impl PositionsBook {
    /// Book over `positions` as loaded from the backend
    #[must_use]
    pub fn new(positions: Vec<PositionDetails>) -> Self {
        let mut book = Self {
            positions,
            ..Self::default()
        };
        book.recompute_summaries();
        book
    }

    /// Rows
    #[must_use]
    pub fn positions(&self) -> &[PositionDetails] {
        &self.positions
    }

    /// Overall NRML totals
    #[must_use]
    pub const fn summary(&self) -> &PositionsSummary {
        &self.summary
    }

    /// NRML totals per trading account, in first-seen order
    #[must_use]
    pub fn groups(&self) -> &[PositionsSummary] {
        &self.groups
    }

    fn recompute_summaries(&mut self) {
        self.summary = PositionsSummary::over(&self.positions);

        let mut order: Vec<&str> = Vec::new();
        let mut by_user: FxHashMap<&str, Vec<&PositionDetails>> = FxHashMap::default();
        for details in &self.positions {
            let rows = by_user.entry(details.user_id.as_str()).or_default();
            if rows.is_empty() {
                order.push(details.user_id.as_str());
            }
            rows.push(details);
        }

        self.groups = order
            .into_iter()
            .map(|user| PositionsSummary {
                user_id: user.to_string(),
                ..PositionsSummary::over(by_user.get(user).into_iter().flatten().copied())
            })
            .collect();
    }
}

impl TickReducer for PositionsBook {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        let mut changed = 0;
        for tick in ticks {
            for details in self
                .positions
                .iter_mut()
                .filter(|d| d.instrument_token == Some(tick.instrument_token))
            {
                if apply_tick(details, tick) {
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.recompute_summaries();
        }
        changed
    }

    fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        unique_tokens(self.positions.iter().filter_map(|d| d.instrument_token))
    }
}
