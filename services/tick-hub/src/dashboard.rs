//! Home dashboard: multi-source load and aggregate statistics

use crate::derived::{holdings, positions, ratio_of, unique_tokens, PositionsSummary, TickReducer};
use crate::rest::PortfolioApi;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use services_common::{
    FundDetails, Holding, InstrumentToken, IpoDetails, MfSipDetails, Notification, Notifier,
    OrderDetails, PositionDetails, ServiceResult, Tick, PENDING_ORDER_STATUSES,
};
use std::future::Future;
use tracing::{debug, error};

/// Everything the dashboard loads, one list per source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardData {
    /// Equity holdings
    pub holdings: Vec<Holding>,
    /// Open and closed positions
    pub positions: Vec<PositionDetails>,
    /// Day's orders
    pub orders: Vec<OrderDetails>,
    /// Funds per account
    pub funds: Vec<FundDetails>,
    /// Mutual-fund SIPs
    pub mf_sips: Vec<MfSipDetails>,
    /// IPOs
    pub ipos: Vec<IpoDetails>,
}

/// Fetch one source; a failure becomes an empty list and one error notification
async fn load_source<T, F>(
    fetch: F,
    notifier: &dyn Notifier,
    title: &str,
    message: &str,
) -> Vec<T>
where
    F: Future<Output = ServiceResult<Vec<T>>>,
{
    match fetch.await {
        Ok(rows) => rows,
        Err(err) => {
            error!(source = title, error = %err, "Dashboard source failed");
            if !err.is_auth_failure() {
                notifier.notify(Notification::error(title, message));
            }
            Vec::new()
        }
    }
}

/// Load all six sources concurrently
///
/// Sources fail independently; the dashboard always renders with whatever
/// loaded.
pub async fn load_dashboard(api: &dyn PortfolioApi, notifier: &dyn Notifier) -> DashboardData {
    let (holdings, positions, orders, funds, mf_sips, ipos) = tokio::join!(
        load_source(api.holdings(), notifier, "Holdings Error", "Failed to load holdings data"),
        load_source(api.positions(), notifier, "Positions Error", "Failed to load positions data"),
        load_source(api.orders(), notifier, "Orders Error", "Failed to load orders data"),
        load_source(api.funds(), notifier, "Funds Error", "Failed to load funds data"),
        load_source(
            api.mf_sips(),
            notifier,
            "MF SIPs Error",
            "Failed to load mutual fund SIPs data"
        ),
        load_source(api.ipos(), notifier, "IPOs Error", "Failed to load IPOs data"),
    );
    debug!(
        holdings = holdings.len(),
        positions = positions.len(),
        orders = orders.len(),
        "Dashboard loaded"
    );
    DashboardData {
        holdings,
        positions,
        orders,
        funds,
        mf_sips,
        ipos,
    }
}

impl DashboardData {
    /// Rows belonging to `user_ids`; an empty selection keeps everything
    #[must_use]
    pub fn for_users(&self, user_ids: &[String]) -> Self {
        if user_ids.is_empty() {
            return self.clone();
        }
        let selected = |id: &str| user_ids.iter().any(|u| u == id);
        Self {
            holdings: self.holdings.iter().filter(|h| selected(&h.user_id)).cloned().collect(),
            positions: self.positions.iter().filter(|p| selected(&p.user_id)).cloned().collect(),
            orders: self
                .orders
                .iter()
                .filter(|o| selected(&o.user_id))
                .cloned()
                .collect(),
            funds: self.funds.iter().filter(|f| selected(&f.user_id)).cloned().collect(),
            mf_sips: self.mf_sips.iter().filter(|s| selected(&s.user_id)).cloned().collect(),
            ipos: self.ipos.iter().filter(|i| selected(&i.user_id)).cloned().collect(),
        }
    }
}

impl TickReducer for DashboardData {
    fn apply_ticks(&mut self, ticks: &[Tick]) -> usize {
        let mut changed = 0;
        for tick in ticks {
            for holding in self
                .holdings
                .iter_mut()
                .filter(|h| h.instrument_token == tick.instrument_token)
            {
                changed += usize::from(holdings::apply_tick(holding, tick));
            }
            for details in self
                .positions
                .iter_mut()
                .filter(|p| p.instrument_token == Some(tick.instrument_token))
            {
                changed += usize::from(positions::apply_tick(details, tick));
            }
        }
        changed
    }

    /// Holding and position tokens
    fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        unique_tokens(
            self.holdings
                .iter()
                .map(|h| h.instrument_token)
                .filter(|&t| t != 0)
                .chain(self.positions.iter().filter_map(|p| p.instrument_token)),
        )
    }
}

/// Headline figures shown on the dashboard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of quantity * average price
    pub total_investment: f64,
    /// Sum of quantity * last price
    pub current_value: f64,
    /// Current value minus investment
    pub total_gains: f64,
    /// Total gains over investment, as a ratio
    pub total_gains_percent: f64,
    /// Sum of holding day P&L
    pub today_gains: f64,
    /// Today's gains over investment, as a ratio
    pub today_gains_percent: f64,
    /// Open NRML positions
    pub open_positions: usize,
    /// NRML P&L
    #[serde(rename = "totalPnL")]
    pub total_pnl: f64,
    /// NRML sell value minus buy value
    pub max_profit: f64,
    /// Worst single NRML P&L, capped at 0
    pub max_loss: f64,
    /// Max profit minus P&L
    pub profit_left: f64,
    /// Orders in a pending status
    pub open_orders: usize,
    /// ACTIVE SIPs
    pub active_sips: usize,
    /// IPOs still accepting applications
    pub open_ipos: usize,
    /// Sum of net margin
    pub available_funds: f64,
    /// Sum of instalment amounts over non-paused SIPs
    pub total_sip_amount: f64,
    /// Instalments already paid this month
    pub contribution_this_month: f64,
    /// PAUSED SIPs
    pub paused_sips: usize,
    /// Sum of debits
    pub utilized_funds: f64,
    /// Sum of collateral
    pub total_collateral_margin: f64,
    /// Utilized plus available minus collateral
    pub total_cash: f64,
    /// Available funds over collateral, in percent
    pub available_margin_percent: f64,
}

impl DashboardStats {
    /// Compute statistics over `data` as of `now`
    #[must_use]
    pub fn compute(data: &DashboardData, now: NaiveDateTime) -> Self {
        let mut stats = Self::default();

        for holding in &data.holdings {
            let quantity = holding.quantity as f64;
            let investment = quantity * holding.average_price;
            let current_value = quantity * holding.last_price;
            stats.total_investment += investment;
            stats.current_value += current_value;
            stats.total_gains += current_value - investment;
            stats.today_gains += holding.day_pnl;
        }
        if stats.total_investment > 0.0 {
            stats.total_gains_percent = ratio_of(stats.total_gains, stats.total_investment);
            stats.today_gains_percent = ratio_of(stats.today_gains, stats.total_investment);
        }

        let nrml = PositionsSummary::over(&data.positions);
        stats.open_positions = nrml.open_positions;
        stats.total_pnl = nrml.total_pnl;
        stats.max_profit = nrml.max_profit;
        stats.max_loss = nrml.max_loss;
        stats.profit_left = nrml.profit_left;

        stats.open_orders = data
            .orders
            .iter()
            .filter(|o| PENDING_ORDER_STATUSES.contains(&o.order.status.as_str()))
            .count();
        stats.open_ipos = data.ipos.iter().filter(|ipo| ipo.is_open()).count();

        stats.add_sips(&data.mf_sips, now);
        stats.add_funds(&data.funds);
        stats
    }

    fn add_sips(&mut self, sips: &[MfSipDetails], now: NaiveDateTime) {
        for sip in sips.iter().filter_map(|s| s.mf_sip.as_ref()) {
            if sip.status == "PAUSED" {
                self.paused_sips += 1;
                continue;
            }
            self.total_sip_amount += sip.instalment_amount;

            let paid_this_month = sip
                .last_instalment
                .as_deref()
                .and_then(parse_instalment)
                .is_some_and(|paid| {
                    paid.month() == now.month() && paid.year() == now.year() && paid < now
                });
            if paid_this_month {
                self.contribution_this_month += sip.instalment_amount;
            }
            if sip.status == "ACTIVE" {
                self.active_sips += 1;
            }
        }
    }

    fn add_funds(&mut self, funds: &[FundDetails]) {
        for fund in funds {
            self.available_funds += fund.margin.net;
            self.utilized_funds += fund.margin.utilised.debits;
            self.total_collateral_margin += fund.margin.available.collateral;
        }
        self.total_cash = self.utilized_funds + self.available_funds - self.total_collateral_margin;
        if self.total_collateral_margin > 0.0 {
            self.available_margin_percent =
                self.available_funds / self.total_collateral_margin * 100.0;
        }
    }
}

/// Instalment timestamp; a bare date means midnight
fn parse_instalment(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(at) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(at.naive_utc());
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(at);
    }
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
