//! Seams between the engine and the remote services.
//!
//! The HTTP client implements both traits; tests substitute scripted sources.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ApiError;
use crate::models::{Category, PriceEntry, Product};

/// How much of a category a product fetch should pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Every product with every field.
    Full,
    /// One small page with the basic field set.
    Quick { limit: usize },
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// The whole category tree as a flat list.
    async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError>;

    async fn fetch_products(&self, category_id: u64, mode: FetchMode) -> Result<Vec<Product>, ApiError>;
}

/// Live prices for one category plus the server's own timestamp.
#[derive(Debug, Clone, Default)]
pub struct PriceBatch {
    pub server_time: Option<DateTime<Utc>>,
    pub entries: Vec<PriceEntry>,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_prices(&self, category_id: u64) -> Result<PriceBatch, ApiError>;
}
