//! HTTP client for the remote catalog and pricing services.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use tracing::{debug, warn};

use super::source::{CatalogSource, FetchMode, PriceBatch, PriceSource};
use super::types::{parse_categories, parse_price_batch, parse_products};
use super::ApiError;
use crate::models::{Category, Product};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the catalog and pricing services.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    catalog_url: String,
    pricing_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(catalog_url: &str, pricing_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            catalog_url: catalog_url.trim_end_matches('/').to_string(),
            pricing_url: pricing_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn categories_url(&self) -> String {
        format!("{}/categorias", self.catalog_url)
    }

    fn products_url(&self, category_id: u64, mode: FetchMode) -> String {
        match mode {
            FetchMode::Full => format!("{}/categorias/{}/productos", self.catalog_url, category_id),
            FetchMode::Quick { limit } => format!(
                "{}/categorias/{}/productos?limite={}&campos=basico",
                self.catalog_url, category_id, limit
            ),
        }
    }

    fn prices_url(&self, category_id: u64) -> String {
        format!("{}/precios/categoria/{}", self.pricing_url, category_id)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid API token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
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

    /// GET a URL and return the raw body, retrying on 429 with exponential backoff.
    async fn get_text(&self, url: &str) -> Result<String, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response.text().await?),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl CatalogSource for ApiClient {
    async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        let url = self.categories_url();
        debug!(url = %url, "Fetching categories");
        let body = self.get_text(&url).await?;
        parse_categories(&body)
    }

    async fn fetch_products(&self, category_id: u64, mode: FetchMode) -> Result<Vec<Product>, ApiError> {
        let url = self.products_url(category_id, mode);
        debug!(url = %url, category_id, ?mode, "Fetching products");
        let body = self.get_text(&url).await?;
        parse_products(&body, category_id)
    }
}

#[async_trait]
impl PriceSource for ApiClient {
    async fn fetch_prices(&self, category_id: u64) -> Result<PriceBatch, ApiError> {
        let url = self.prices_url(category_id);
        debug!(url = %url, category_id, "Fetching prices");
        let body = self.get_text(&url).await?;
        Ok(parse_price_batch(&body, category_id, Utc::now()))
    }
}
