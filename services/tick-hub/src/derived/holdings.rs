//! Holdings valuation

use super::{percent_of, ratio_of, unique_tokens, TickReducer};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use services_common::{Holding, InstrumentToken, Tick};

/// Reprice one holding from `tick`
///
/// Returns `false`, leaving the row untouched, when the last traded price is
/// unchanged.
pub fn apply_tick(holding: &mut Holding, tick: &Tick) -> bool {
    let ltp = tick.last_traded_price;
    if holding.last_price == ltp {
        return false;
    }

    let quantity = holding.quantity as f64;
    let invested = holding.invested();
    holding.last_price = ltp;
    holding.current_value = quantity * ltp;
    holding.net_pnl = holding.current_value - invested;
    holding.net_change_percentage = percent_of(holding.net_pnl, invested);
    holding.day_change_percentage = percent_of(ltp - tick.close_price, tick.close_price);
    holding.day_pnl = holding.day_change_percentage * quantity * tick.close_price / 100.0;
    true
}

/// Totals over a set of holdings
///
/// The two percentages are plain ratios to the total investment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsSummary {
    /// Account the totals belong to; empty for the overall summary
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub user_id: String,
    /// Sum of investments
    pub total_investment: f64,
    /// Sum of current values
    pub current_value: f64,
    /// Sum of day P&L
    #[serde(rename = "daysPnL")]
    pub days_pnl: f64,
    /// Sum of net P&L
    #[serde(rename = "totalPnL")]
    pub total_pnl: f64,
    /// Day P&L over total investment
    #[serde(rename = "daysPnLPercentage")]
    pub days_pnl_ratio: f64,
    /// Net P&L over total investment
    #[serde(rename = "totalPnLPercentage")]
    pub total_pnl_ratio: f64,
}

impl HoldingsSummary {
    fn add(&mut self, holding: &Holding) {
        self.total_investment += holding.invested();
        self.current_value += holding.current_value;
        self.days_pnl += holding.day_pnl;
        self.total_pnl += holding.net_pnl;
    }

    fn finish(mut self) -> Self {
        self.days_pnl_ratio = ratio_of(self.days_pnl, self.total_investment);
        self.total_pnl_ratio = ratio_of(self.total_pnl, self.total_investment);
        self
    }
}

/// Holdings screen state
#[derive(Debug, Clone, Default)]
pub struct HoldingsBook {
    holdings: Vec<Holding>,
    summary: HoldingsSummary,
    groups: Vec<HoldingsSummary>,
}

impl HoldingsBook {
    /// Book over `holdings` as loaded from the backend
    #[must_use]
    pub fn new(holdings: Vec<Holding>) -> Self {
        let mut book = Self {
            holdings,
            ..Self::default()
        };
        book.recompute_summaries();
        book
    }

    /// Rows
    #[must_use]
    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    /// Overall totals
    #[must_use]
    pub const fn summary(&self) -> &HoldingsSummary {
        &self.summary
    }

    /// Totals per trading account, in first-seen order
    #[must_use]
    pub fn groups(&self) -> &[HoldingsSummary] {
        &self.groups
    }

    fn recompute_summaries(&mut self) {
        let mut total = HoldingsSummary::default();
        let mut groups: Vec<HoldingsSummary> = Vec::new();
        let mut index: FxHashMap<&str, usize> = FxHashMap::default();

        for holding in &self.holdings {
            total.add(holding);
            let slot = *index.entry(holding.user_id.as_str()).or_insert_with(|| {
                groups.push(HoldingsSummary {
                    user_id: holding.user_id.clone(),
                    ..HoldingsSummary::default()
                });
                groups.len() - 1
            });
            groups[slot].add(holding);
        }

        self.summary = total.finish();
        self.groups = groups.into_iter().map(HoldingsSummary::finish).collect();
    }
}

impl TickReducer for HoldingsBook {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        let mut changed = 0;
        for tick in ticks {
            for holding in self
                .holdings
                .iter_mut()
                .filter(|h| h.instrument_token == tick.instrument_token)
            {
                if apply_tick(holding, tick) {
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
        unique_tokens(self.holdings.iter().map(|h| h.instrument_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn holding(user: &str, token: InstrumentToken, quantity: i64, average: f64) -> Holding {
        Holding {
            user_id: user.to_string(),
            instrument_token: token,
            quantity,
            average_price: average,
            ..Holding::default()
        }
    }

    fn tick(token: InstrumentToken, ltp: f64, close: f64) -> Tick {
        Tick {
            instrument_token: token,
            last_traded_price: ltp,
            close_price: close,
            ..Tick::default()
        }
    }

    #[test]
    fn test_zero_close_gives_zero_day_change() {
        let mut row = holding("A", 1, 5, 100.0);
        assert!(apply_tick(&mut row, &tick(1, 110.0, 0.0)));
        assert_eq!(row.day_change_percentage, 0.0);
        assert_eq!(row.day_pnl, 0.0);
        assert_eq!(row.net_pnl, 50.0);
    }

    #[test]
    fn test_groups_per_account() {
        let mut book = HoldingsBook::new(vec![
            holding("A", 1, 10, 100.0),
            holding("B", 1, 5, 100.0),
            holding("A", 2, 1, 50.0),
        ]);
        assert_eq!(book.apply_ticks(&[tick(1, 110.0, 100.0)]), 2);

        let groups = book.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].user_id, "A");
        assert_eq!(groups[0].total_investment, 1050.0);
        assert_eq!(groups[0].days_pnl, 100.0);
        assert_eq!(groups[1].total_pnl, 50.0);

        let summary = book.summary();
        assert_eq!(summary.total_investment, 1550.0);
        assert!((summary.days_pnl_ratio - 150.0 / 1550.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_field_names() {
        let value = serde_json::to_value(HoldingsSummary::default()).unwrap();
        assert!(value.get("daysPnL").is_some());
        assert!(value.get("totalPnLPercentage").is_some());
        assert!(value.get("userId").is_none());
    }
}
