//! API client for communicating with the dairy backend REST API.
//!
//! This module provides the `ApiClient` struct, which implements the
//! [`Repository`], [`QuantitySource`] and [`OrderGateway`] boundaries over HTTP.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{ApiError, OrderGateway, QuantitySource, Repository};
use crate::config::Config;
use crate::models::{Entity, Order, OrderRequest, ProductQuantity};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Path of the stock snapshot endpoint.
const QUANTITIES_PATH: &str = "products/quantities";

/// API client for the dairy backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client from configuration
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Unauthorized)?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn execute<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn parse<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.execute(url, || self.client.get(url)).await?;
        Self::parse(url, response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<T, ApiError> {
        let response = self.execute(url, || self.client.post(url).json(body)).await?;
        Self::parse(url, response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<T, ApiError> {
        let response = self.execute(url, || self.client.put(url).json(body)).await?;
        Self::parse(url, response).await
    }

    async fn delete_at(&self, url: &str) -> Result<(), ApiError> {
        self.execute(url, || self.client.delete(url)).await?;
        Ok(())
    }
}

impl<T: Entity> Repository<T> for ApiClient {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<T>, ApiError>> {
        async move {
            let url = self.url(T::KIND.path());
            let records: Vec<T> = self.get(&url).await?;
            debug!(kind = %T::KIND, count = records.len(), "Fetched list");
            Ok(records)
        }
        .boxed()
    }

    fn create(&self, record: T) -> BoxFuture<'_, Result<T, ApiError>> {
        async move { self.post(&self.url(T::KIND.path()), &record).await }.boxed()
    }

    fn update(&self, id: i64, record: T) -> BoxFuture<'_, Result<T, ApiError>> {
        async move {
            let url = format!("{}/{}", self.url(T::KIND.path()), id);
            self.put(&url, &record).await
        }
        .boxed()
    }

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<(), ApiError>> {
        async move {
            let url = format!("{}/{}", self.url(T::KIND.path()), id);
            self.delete_at(&url).await
        }
        .boxed()
    }
}

impl QuantitySource for ApiClient {
    fn fetch_quantities(&self) -> BoxFuture<'_, Result<ProductQuantity, ApiError>> {
        async move { self.get(&self.url(QUANTITIES_PATH)).await }.boxed()
    }
}

impl OrderGateway for ApiClient {
    fn submit_order(&self, request: OrderRequest) -> BoxFuture<'_, Result<Order, ApiError>> {
        async move {
            let url = self.url(crate::models::EntityKind::Orders.path());
            self.post(&url, &request).await
        }
        .boxed()
    }
}
