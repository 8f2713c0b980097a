//! FamVest REST API

mod client;

pub use client::RestClient;

use async_trait::async_trait;
use services_common::{
    BasketMargin, BasketMarginRequest, FundDetails, Holding, IpoDetails, MfSipDetails, OrderDetails, OrderRequest, PlacedOrder,
    PositionDetails, ServiceResult,
};

/// Portfolio endpoints consumed by the dashboard and bulk actions
#[async_trait]
pub trait PortfolioApi: Send + Sync {
    /// `GET /v1/holdings`
    async fn holdings(&self) -> ServiceResult<Vec<Holding>>;

    /// `GET /v1/positions`
    async fn positions(&self) -> ServiceResult<Vec<PositionDetails>>;

    /// `GET /v1/orders`
    async fn orders(&self) -> ServiceResult<Vec<OrderDetails>>;

    /// `GET /v1/funds`
    async fn funds(&self) -> ServiceResult<Vec<FundDetails>>;

    /// `GET /v1/mf/sips`
    async fn mf_sips(&self) -> ServiceResult<Vec<MfSipDetails>>;

    /// `GET /v1/ipos`
    async fn ipos(&self) -> ServiceResult<Vec<IpoDetails>>;

    /// `DELETE /v1/orders/{account_id}/{order_id}?variety=`
    async fn cancel_order(&self, account_id: &str, order_id: &str, variety: &str)
    -> ServiceResult<()>;

    /// `POST /v1/funds/margins/basket`
    async fn basket_margin(&self, request: &BasketMarginRequest) -> ServiceResult<BasketMargin>;

    /// `POST /v1/orders?variety=`
    async fn place_order(&self, request: &OrderRequest, variety: &str)
    -> ServiceResult<PlacedOrder>;
}
