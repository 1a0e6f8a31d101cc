//! Fixtures and scripted collaborators shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::api::{ApiError, CatalogSource, FetchMode, PriceBatch, PriceSource};
use crate::models::{Category, LastKnown, PriceEntry, Product, Visibility};
use crate::store::{CatalogStore, StoreError, StoreResult, StoreStats};
use crate::sync::SyncRecord;

pub(crate) fn sample_category(id: u64, name: &str, parent_id: Option<u64>) -> Category {
    Category {
        id,
        name: name.to_string(),
        active: true,
        parent_id,
    }
}

/// A product whose stored fallback price is 10.00.
pub(crate) fn sample_product(id: u64, category_id: u64, name: &str) -> Product {
    Product {
        id,
        name: name.to_string(),
        category_id,
        brand_id: None,
        brand_name: None,
        sku: format!("SKU-{id}"),
        media: None,
        visibility: Visibility {
            online: true,
            ..Default::default()
        },
        last_known: LastKnown {
            price: Some(Decimal::new(1000, 2)),
            online_price: None,
            stock: Some(1),
        },
    }
}

/// A plain entry with no promotion. The cache restamps `fetched_at`.
pub(crate) fn sample_price(product_id: u64, base_price: Decimal) -> PriceEntry {
    PriceEntry {
        product_id,
        base_price,
        online_price: None,
        promo_price: None,
        promo_start: None,
        promo_end: None,
        stock: Some(7),
        fetched_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn bump(counts: &Mutex<HashMap<u64, usize>>, key: u64) {
    *lock(counts).entry(key).or_default() += 1;
}

// ============================================================================
// Catalog service
// ============================================================================

#[derive(Default)]
pub(crate) struct MockCatalog {
    categories: Mutex<Vec<Category>>,
    products: Mutex<HashMap<u64, Vec<Product>>>,
    failing: Mutex<HashSet<u64>>,
    malformed: Mutex<HashSet<u64>>,
    categories_fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    category_calls: AtomicUsize,
    product_calls: Mutex<HashMap<u64, usize>>,
    last_modes: Mutex<HashMap<u64, FetchMode>>,
}

impl MockCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_category(&self, category: Category) {
        lock(&self.categories).push(category);
    }

    pub(crate) fn set_products(&self, category_id: u64, products: Vec<Product>) {
        lock(&self.products).insert(category_id, products);
    }

    pub(crate) fn fail_products_for(&self, category_id: u64) {
        lock(&self.failing).insert(category_id);
    }

    pub(crate) fn heal_products_for(&self, category_id: u64) {
        lock(&self.failing).remove(&category_id);
    }

    pub(crate) fn malformed_products_for(&self, category_id: u64) {
        lock(&self.malformed).insert(category_id);
    }

    pub(crate) fn fail_categories(&self) {
        self.categories_fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub(crate) fn category_calls(&self) -> usize {
        self.category_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn product_calls(&self, category_id: u64) -> usize {
        lock(&self.product_calls).get(&category_id).copied().unwrap_or(0)
    }

    pub(crate) fn total_product_calls(&self) -> usize {
        lock(&self.product_calls).values().sum()
    }

    pub(crate) fn last_mode(&self, category_id: u64) -> Option<FetchMode> {
        lock(&self.last_modes).get(&category_id).copied()
    }

    async fn pause(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.category_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.categories_fail.load(Ordering::SeqCst) {
            return Err(ApiError::ServerError("HTTP 503".to_string()));
        }
        Ok(lock(&self.categories).clone())
    }

    async fn fetch_products(&self, category_id: u64, mode: FetchMode) -> Result<Vec<Product>, ApiError> {
        bump(&self.product_calls, category_id);
        lock(&self.last_modes).insert(category_id, mode);
        self.pause().await;

        if lock(&self.failing).contains(&category_id) {
            return Err(ApiError::ServerError("HTTP 503".to_string()));
        }
        if lock(&self.malformed).contains(&category_id) {
            return Err(ApiError::InvalidResponse("expected a product list".to_string()));
        }

        let mut products = lock(&self.products).get(&category_id).cloned().unwrap_or_default();
        if let FetchMode::Quick { limit } = mode {
            products.truncate(limit);
        }
        Ok(products)
    }
}

// ============================================================================
// Pricing service
// ============================================================================

#[derive(Default)]
pub(crate) struct MockPrices {
    prices: Mutex<HashMap<u64, Vec<PriceEntry>>>,
    failing: Mutex<HashSet<u64>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<HashMap<u64, usize>>,
}

impl MockPrices {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_prices(&self, category_id: u64, entries: Vec<PriceEntry>) {
        lock(&self.prices).insert(category_id, entries);
    }

    pub(crate) fn fail_for(&self, category_id: u64) {
        lock(&self.failing).insert(category_id);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub(crate) fn calls(&self, category_id: u64) -> usize {
        lock(&self.calls).get(&category_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PriceSource for MockPrices {
    async fn fetch_prices(&self, category_id: u64) -> Result<PriceBatch, ApiError> {
        bump(&self.calls, category_id);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if lock(&self.failing).contains(&category_id) {
            return Err(ApiError::ServerError("HTTP 502".to_string()));
        }
        Ok(PriceBatch {
            server_time: None,
            entries: lock(&self.prices).get(&category_id).cloned().unwrap_or_default(),
        })
    }
}

// ============================================================================
// Broken storage
// ============================================================================

/// A store whose every call fails, as when the disk is gone.
pub(crate) struct FailingStore;

fn unavailable<T>() -> StoreResult<T> {
    Err(StoreError::Io(std::io::Error::other("disk unavailable")))
}

impl CatalogStore for FailingStore {
    fn get_category(&self, _id: u64) -> StoreResult<Option<Category>> {
        unavailable()
    }

    fn list_categories(&self, _active_only: bool) -> StoreResult<Vec<Category>> {
        unavailable()
    }

    fn get_product(&self, _id: u64) -> StoreResult<Option<Product>> {
        unavailable()
    }

    fn list_products_by_category(&self, _category_id: u64) -> StoreResult<Vec<Product>> {
        unavailable()
    }

    fn search_products(&self, _query: &str) -> StoreResult<Vec<Product>> {
        unavailable()
    }

    fn upsert_categories(&self, _batch: &[Category]) -> StoreResult<()> {
        unavailable()
    }

    fn upsert_products(&self, _batch: &[Product]) -> StoreResult<()> {
        unavailable()
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        unavailable()
    }

    fn load_sync_records(&self) -> StoreResult<Vec<SyncRecord>> {
        unavailable()
    }

    fn save_sync_record(&self, _record: &SyncRecord) -> StoreResult<()> {
        unavailable()
    }
}
