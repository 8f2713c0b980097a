//! Bulk order cancellation and position exit
//!
//! Items are submitted concurrently. Each item settles on its own; the
//! aggregate is reported once all of them have.

use crate::rest::PortfolioApi;
use futures::future::join_all;
use services_common::{
    Notification, Notifier, OrderDetails, OrderParams, OrderRequest, OrderType, PositionDetails,
    ServiceError, TransactionType,
};
use tracing::{info, warn};

/// Tag carried by exit orders
pub const BULK_EXIT_TAG: &str = "famvest-bulk-exit";

/// Fallback text for a failure without a backend message
const UNKNOWN_ERROR: &str = "Unknown error";

/// One failed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    /// Order id or position name
    pub label: String,
    /// Backend message
    pub message: String,
}

/// Aggregate result of a bulk action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Items that went through
    pub succeeded: usize,
    /// Items that failed
    pub failed: usize,
    /// Failure details in submission order
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    fn record(&mut self, label: &str, result: Result<(), &ServiceError>) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(err) => {
                self.failed += 1;
                self.failures.push(BulkFailure {
                    label: label.to_string(),
                    message: err.user_message(UNKNOWN_ERROR),
                });
            }
        }
    }

    /// Items processed
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Cancel every order in `orders`
pub async fn cancel_orders(
    api: &dyn PortfolioApi,
    orders: &[OrderDetails],
    notifier: &dyn Notifier,
) -> BulkOutcome {
    if orders.is_empty() {
        notifier.notify(Notification::warning("Warning", "No orders selected"));
        return BulkOutcome::default();
    }

    let results = join_all(orders.iter().map(|details| {
        let order = &details.order;
        api.cancel_order(&order.account_id, &order.order_id, &order.order_variety)
    }))
    .await;

    let mut outcome = BulkOutcome::default();
    for (details, result) in orders.iter().zip(&results) {
        if let Err(err) = result {
            warn!(order_id = %details.order.order_id, error = %err, "Order cancel failed");
        }
        outcome.record(&details.order.order_id, result.as_ref().map(|_| ()));
    }

    let BulkOutcome {
        succeeded, failed, ..
    } = outcome;
    info!(succeeded, failed, "Bulk cancel finished");
    if succeeded > 0 {
        let plural = if succeeded > 1 { "s" } else { "" };
        let failed_note = if failed > 0 {
            format!(", {failed} failed")
        } else {
            String::new()
        };
        notifier.notify(Notification::success(
            "Bulk Cancel Complete",
            format!("Successfully cancelled {succeeded} order{plural}{failed_note}"),
        ));
    } else {
        notifier.notify(Notification::error(
            "Error",
            format!("All {failed} order cancellations failed"),
        ));
    }
    outcome
}

/// Market order closing `details` on the opposite side
#[must_use]
pub fn exit_order(details: &PositionDetails) -> OrderRequest {
    let position = &details.position;
    let transaction_type = if position.net_quantity > 0 {
        TransactionType::Sell
    } else {
        TransactionType::Buy
    };
    OrderRequest {
        trading_account_id: details.user_id.clone(),
        order_params: OrderParams {
            quantity: position.net_quantity.abs(),
            order_type: OrderType::Market,
            trading_symbol: position.trading_symbol.clone(),
            product: position.product.clone(),
            exchange: position.exchange.clone(),
            transaction_type,
            validity: "DAY".to_string(),
            price: 0.0,
            trigger_price: 0.0,
            tag: BULK_EXIT_TAG.to_string(),
        },
    }
}

/// Exit every position in `positions` with a market order
///
/// Each item is reported as it settles, followed by one sticky summary.
pub async fn exit_positions(
    api: &dyn PortfolioApi,
    positions: &[PositionDetails],
    notifier: &dyn Notifier,
) -> BulkOutcome {
    if positions.is_empty() {
        notifier.notify(Notification::warning("Warning", "No positions selected"));
        return BulkOutcome::default();
    }

    let requests: Vec<_> = positions.iter().map(exit_order).collect();
    let results = join_all(
        requests
            .iter()
            .map(|request| api.place_order(request, "regular")),
    )
    .await;

    let mut outcome = BulkOutcome::default();
    let mut exited = Vec::new();
    for (details, result) in positions.iter().zip(&results) {
        let name = &details.display_name;
        match result {
            Ok(placed) => {
                notifier.notify(Notification::success(
                    "Position Exit Success",
                    format!(
                        "Position {name} exited successfully. Order ID: {}",
                        placed.order_id
                    ),
                ));
                exited.push(format!("• {name} - Order ID: {}", placed.order_id));
            }
            Err(err) => {
                warn!(position = %name, error = %err, "Position exit failed");
                notifier.notify(Notification::error(
                    "Position Exit Error",
                    format!(
                        "Position exit failed for {name}: {}",
                        err.user_message(UNKNOWN_ERROR)
                    ),
                ));
            }
        }
        outcome.record(name, result.as_ref().map(|_| ()));
    }

    info!(
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "Bulk exit finished"
    );
    notifier.notify(exit_summary(&outcome, &exited).sticky());
    outcome
}

fn exit_summary(outcome: &BulkOutcome, exited: &[String]) -> Notification {
    let header = format!(
        "Bulk Exit Summary:\nSucceeded: {}\nFailed: {}\nTotal: {}",
        outcome.succeeded,
        outcome.failed,
        outcome.total()
    );
    let failed_details = outcome
        .failures
        .iter()
        .map(|f| format!("• {}: {}", f.label, f.message))
        .collect::<Vec<_>>()
        .join("\n");

    if outcome.failed == 0 {
        Notification::info(
            "Bulk Exit Successful",
            format!("{header}\n\nExited Positions:\n{}", exited.join("\n")),
        )
    } else {
        let title = if outcome.succeeded > 0 {
            "Bulk Exit Completed"
        } else {
            "Bulk Exit Failed"
        };
        Notification::info(title, format!("{header}\n\nFailed Positions:\n{failed_details}"))
    }
}
