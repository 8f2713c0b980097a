//! reqwest-backed API client

use super::PortfolioApi;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use services_common::{
    ApiResponse, BasketMargin, BasketMarginRequest, ClientConfig, FundDetails, Holding, IpoDetails, MfSipDetails, OrderDetails,
    OrderRequest, PlacedOrder, PositionDetails, SESSION_EXPIRED_REDIRECT, ServiceError,
    ServiceResult, TokenProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Authenticated client for the FamVest REST API
///
/// Every request carries the current bearer token. A 401 or 403 clears the
/// token and surfaces as [`ServiceError::SessionExpired`].
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Client for `config.base_url`
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> ServiceResult<Self> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(ms) = config.http_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let http = builder
            .build()
            .map_err(|e| ServiceError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET path`, unwrapping the `data` envelope
    pub async fn get<T>(&self, path: &str) -> ServiceResult<T>
    where
        T: DeserializeOwned + Default,
    {
        self.execute(self.request(Method::GET, path)).await
    }

    /// `POST path` with a JSON body
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ServiceResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Default,
    {
        self.execute(self.request(Method::POST, path).json(body)).await
    }

    /// `DELETE path`
    pub async fn delete<T>(&self, path: &str) -> ServiceResult<T>
    where
        T: DeserializeOwned + Default,
    {
        self.execute(self.request(Method::DELETE, path)).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match self.tokens.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T>(&self, request: RequestBuilder) -> ServiceResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;

        if !status.is_success() {
            let err = ServiceError::from_status(status.as_u16(), &body);
            if err.is_auth_failure() {
                self.tokens.clear();
                warn!(
                    status = status.as_u16(),
                    redirect = SESSION_EXPIRED_REDIRECT,
                    "Session expired, token cleared"
                );
            } else {
                debug!(status = status.as_u16(), error = %err, "Request failed");
            }
            return Err(err);
        }

        if body.trim().is_empty() {
            return Ok(T::default());
        }
        let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl PortfolioApi for RestClient {
    async fn holdings(&self) -> ServiceResult<Vec<Holding>> {
        self.get("/v1/holdings").await
    }

    async fn positions(&self) -> ServiceResult<Vec<PositionDetails>> {
        self.get("/v1/positions").await
    }

    async fn orders(&self) -> ServiceResult<Vec<OrderDetails>> {
        self.get("/v1/orders").await
    }

    async fn funds(&self) -> ServiceResult<Vec<FundDetails>> {
        self.get("/v1/funds").await
    }

    async fn mf_sips(&self) -> ServiceResult<Vec<MfSipDetails>> {
        self.get("/v1/mf/sips").await
    }

    async fn ipos(&self) -> ServiceResult<Vec<IpoDetails>> {
        self.get("/v1/ipos").await
    }

    async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
        variety: &str,
    ) -> ServiceResult<()> {
        let path = format!("/v1/orders/{account_id}/{order_id}?variety={variety}");
        let _: serde_json::Value = self.delete(&path).await?;
        Ok(())
    }

    async fn basket_margin(&self, request: &BasketMarginRequest) -> ServiceResult<BasketMargin> {
        self.post("/v1/funds/margins/basket", request).await
    }

    async fn place_order(&self, request: &OrderRequest, variety: &str) -> ServiceResult<PlacedOrder> {
        self.post(&format!("/v1/orders?variety={variety}"), request)
            .await
    }
}
