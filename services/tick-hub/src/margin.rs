//! Debounced basket margin recalculation
//!
//! Every basket edit asks for a new margin; only the last request of a burst
//! reaches the backend.

use crate::debounce::debounce;
use crate::derived::basket::BasketDraft;
use crate::rest::PortfolioApi;
use services_common::{BasketMargin, BasketMarginRequest, ServiceError, ServiceResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Background margin calculator for one basket screen
pub struct MarginRecalc {
    requests: mpsc::Sender<BasketMarginRequest>,
    results: mpsc::Receiver<ServiceResult<BasketMargin>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for MarginRecalc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarginRecalc").finish_non_exhaustive()
    }
}

impl MarginRecalc {
    /// Start calculating through `api`, waiting `window` after the last request
    pub fn spawn(api: Arc<dyn PortfolioApi>, window: Duration) -> Self {
        let (requests, input) = mpsc::channel::<BasketMarginRequest>(16);
        let (results_tx, results) = mpsc::channel(16);
        let task = tokio::spawn(async move {
            let mut settled = debounce(window, input);
            while let Some(request) = settled.recv().await {
                debug!(
                    account = %request.trading_account_id,
                    legs = request.margin_calculation_params.len(),
                    "Calculating basket margin"
                );
                let result = api.basket_margin(&request).await;
                if let Err(e) = &result {
                    warn!(error = %e, "Basket margin calculation failed");
                }
                if results_tx.send(result).await.is_err() {
                    break;
                }
            }
        });
        Self {
            requests,
            results,
            task,
        }
    }

    /// Queue a calculation
    pub async fn request(&self, request: BasketMarginRequest) -> ServiceResult<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| ServiceError::InternalError("margin calculator stopped".to_string()))
    }

    /// Queue a calculation when `draft` changed since the last one
    ///
    /// Returns whether a request was queued.
    pub async fn request_if_stale(
        &self,
        draft: &mut BasketDraft,
        include_existing_positions: bool,
    ) -> ServiceResult<bool> {
        if !draft.take_recalc() {
            return Ok(false);
        }
        match draft.margin_request(include_existing_positions) {
            Some(request) => self.request(request).await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Next calculated margin, or `None` once stopped
    pub async fn next(&mut self) -> Option<ServiceResult<BasketMargin>> {
        self.results.recv().await
    }
}

impl Drop for MarginRecalc {
    fn drop(&mut self) {
        self.task.abort();
    }
}
