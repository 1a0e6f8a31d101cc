//! The catalog facade: the one entry point consumers talk to.
//!
//! Reads always go to the local store first. The sync tracker decides
//! whether a sync runs in the foreground (nothing local to show) or in
//! the background (local data is stale). Product reads are joined with
//! the price overlay before they are returned. The facade never writes
//! to the store itself.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, CatalogSource, PriceSource};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    build_hierarchy, Category, CategoryNode, EngineStats, EnrichedProduct, Product, ScopeStatus,
};
use crate::prices::{CategoryPrices, PriceCache};
use crate::store::{CatalogStore, RedbCatalogStore, StoreResult};
use crate::sync::{SyncOutcome, SyncReport, SyncScheduler, SyncScope, SyncTracker};

pub struct CatalogEngine {
    config: EngineConfig,
    store: Arc<dyn CatalogStore>,
    scheduler: Arc<SyncScheduler>,
    prices: Arc<PriceCache>,
    clock: Arc<dyn Clock>,
}

impl CatalogEngine {
    /// Build the production stack: redb store on disk, HTTP sources,
    /// system clock.
    pub fn open(config: EngineConfig) -> CatalogResult<Self> {
        let db_path = config
            .db_path()
            .map_err(|e| CatalogError::StorageUnavailable(e.to_string()))?;
        let store = RedbCatalogStore::open(&db_path)?;
        info!(path = %db_path.display(), "Catalog store opened");

        let mut client = ApiClient::new(&config.catalog_url, &config.pricing_url, config.request_timeout())?;
        if let Some(token) = config.api_token.clone() {
            client.set_token(token);
        }
        let client = Arc::new(client);

        Ok(Self::new(
            config,
            Arc::new(store),
            client.clone(),
            client,
            Arc::new(SystemClock),
        ))
    }

    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CatalogStore>,
        catalog: Arc<dyn CatalogSource>,
        prices: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tracker = Arc::new(SyncTracker::new(Arc::clone(&store), Arc::clone(&clock)));
        let scheduler = Arc::new(SyncScheduler::new(
            catalog,
            Arc::clone(&store),
            tracker,
            config.scheduler(),
        ));
        let prices = Arc::new(PriceCache::new(prices, Arc::clone(&clock), config.price_ttl()));
        Self {
            config,
            store,
            scheduler,
            prices,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        self.scheduler.tracker()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Products of a category with live prices joined in.
    ///
    /// An empty category is synced in the foreground; an error is returned
    /// only if that sync fails and nothing local exists. Stale local data
    /// is served as is while a background sync refreshes it.
    pub async fn get_products_by_category(&self, category_id: u64) -> CatalogResult<Vec<EnrichedProduct>> {
        let scope = SyncScope::Category(category_id);
        let ttl = self.config.category_ttl();

        let products = match self.store.list_products_by_category(category_id) {
            Ok(products) => products,
            Err(e) => {
                warn!(category_id, error = %e, "Store unavailable, serving no local data");
                self.scheduler.refresh_in_background(scope, ttl);
                return Ok(Vec::new());
            }
        };

        let products = if products.is_empty() && self.tracker().needs_sync(scope, ttl) {
            debug!(category_id, "No local products, syncing in foreground");
            let synced = self.scheduler.sync_if_stale(scope, ttl).await;
            let products = self.read_or_empty(|store| store.list_products_by_category(category_id));
            match synced {
                Err(e) if products.is_empty() && !e.is_informational() => {
                    error!(category_id, error = %e, "Sync failed with no local products to show");
                    return Err(e);
                }
                Err(e) => debug!(category_id, error = %e, "Foreground sync failed, serving local data"),
                Ok(_) => {}
            }
            products
        } else {
            if self.tracker().needs_sync(scope, ttl) {
                self.scheduler.refresh_in_background(scope, ttl);
            }
            products
        };

        if products.is_empty() {
            return Ok(Vec::new());
        }

        let prices = match self.prices.get_prices_for_category(category_id).await {
            Ok(prices) => Some(prices),
            Err(e) => {
                warn!(category_id, error = %e, "Price fetch failed, showing stored prices");
                None
            }
        };
        Ok(self.enrich(products, prices.as_deref()))
    }

    /// Local-only search. Never syncs and never fetches prices; products
    /// are priced from the overlay only when it already holds them.
    pub fn search_products(&self, query: &str) -> Vec<EnrichedProduct> {
        let products = self.read_or_empty(|store| store.search_products(query));
        self.enrich_from_overlay(products)
    }

    /// One product, local-only.
    pub fn get_product(&self, product_id: u64) -> Option<EnrichedProduct> {
        let product = match self.store.get_product(product_id) {
            Ok(product) => product?,
            Err(e) => {
                warn!(product_id, error = %e, "Store unavailable, product lookup empty");
                return None;
            }
        };
        self.enrich_from_overlay(vec![product]).pop()
    }

    /// The category tree with children in alphabetical order.
    ///
    /// A cold store is filled by a foreground full sync. A stale one is
    /// served immediately while the full sync runs in the background.
    pub async fn get_categories_hierarchy(&self) -> CatalogResult<Vec<CategoryNode>> {
        let ttl = self.config.catalog_ttl();
        let needs_sync = self.tracker().needs_sync(SyncScope::All, ttl);
        let mut categories: Vec<Category> = self.read_or_empty(|store| store.list_categories(false));

        if categories.is_empty() && needs_sync {
            debug!("No local categories, running full sync in foreground");
            let synced = self.scheduler.sync_if_stale(SyncScope::All, ttl).await;
            categories = self.read_or_empty(|store| store.list_categories(false));
            match synced {
                Err(e) if categories.is_empty() && !e.is_informational() => {
                    error!(error = %e, "Full sync failed with no local categories to show");
                    return Err(e);
                }
                Err(e) => debug!(error = %e, "Foreground full sync failed, serving local data"),
                Ok(_) => {}
            }
        } else if needs_sync {
            self.scheduler.refresh_in_background(SyncScope::All, ttl);
        }

        Ok(build_hierarchy(categories))
    }

    // =========================================================================
    // Explicit syncs
    // =========================================================================

    /// Full sync that also drops every cached price.
    pub async fn force_full_sync(&self) -> CatalogResult<SyncOutcome> {
        self.prices.invalidate_all();
        self.scheduler.full_sync().await
    }

    /// Category sync that also drops the category's cached prices.
    pub async fn force_category_sync(&self, category_id: u64) -> CatalogResult<SyncOutcome> {
        self.prices.invalidate(category_id);
        self.scheduler.sync_category(category_id).await
    }

    pub async fn quick_sync(&self, category_id: u64) -> CatalogResult<SyncOutcome> {
        self.scheduler.quick_sync(category_id).await
    }

    pub async fn smart_sync(&self, category_ids: &[u64]) -> SyncReport {
        self.scheduler.smart_sync(category_ids).await
    }

    /// Periodic smart sync over `categories`, or over every active local
    /// category when the list is empty.
    pub fn start_auto_sync(&self, categories: Vec<u64>) {
        let categories = if categories.is_empty() {
            self.read_or_empty(|store| store.list_categories(true))
                .into_iter()
                .map(|c| c.id)
                .collect()
        } else {
            categories
        };
        self.scheduler.start_auto_sync(categories);
    }

    pub fn stop_auto_sync(&self) -> bool {
        self.scheduler.stop_auto_sync()
    }

    pub fn is_auto_sync_running(&self) -> bool {
        self.scheduler.is_auto_sync_running()
    }

    /// Cancel the auto-sync loop and wait for every sync still running,
    /// background refreshes included, to record its outcome.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("Catalog engine shut down");
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Counts and freshness. Never touches the network.
    pub fn stats(&self) -> EngineStats {
        let (storage_available, counts) = match self.store.stats() {
            Ok(counts) => (true, counts),
            Err(e) => {
                warn!(error = %e, "Store stats unavailable");
                (false, Default::default())
            }
        };

        let scopes = self
            .tracker()
            .records()
            .into_iter()
            .map(|record| ScopeStatus {
                scope: record.scope.to_string(),
                last_success: record.last_success,
                last_attempt: record.last_attempt,
                last_error: record.last_error,
                in_flight: record.in_flight,
            })
            .collect();

        EngineStats {
            storage_available,
            total_categories: counts.categories,
            total_products: counts.products,
            scopes,
            price_cache: self.prices.stats(),
            auto_sync_running: self.is_auto_sync_running(),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn read_or_empty<T>(&self, read: impl FnOnce(&dyn CatalogStore) -> StoreResult<Vec<T>>) -> Vec<T> {
        read(self.store.as_ref()).unwrap_or_else(|e| {
            warn!(error = %e, "Store read failed, serving no local data");
            Vec::new()
        })
    }

    fn enrich(&self, products: Vec<Product>, prices: Option<&CategoryPrices>) -> Vec<EnrichedProduct> {
        let now = self.clock.now();
        let ttl = self.prices.ttl();
        let policy = self.config.fallback_price_policy;
        products
            .into_iter()
            .map(|product| {
                let live = prices.and_then(|p| p.get_fresh(product.id, now, ttl)).cloned();
                EnrichedProduct::new(product, live, now, policy)
            })
            .collect()
    }

    fn enrich_from_overlay(&self, products: Vec<Product>) -> Vec<EnrichedProduct> {
        let now = self.clock.now();
        let policy = self.config.fallback_price_policy;
        products
            .into_iter()
            .map(|product| {
                let live = self.prices.peek_price(product.id, product.category_id);
                EnrichedProduct::new(product, live, now, policy)
            })
            .collect()
    }
}

impl Drop for CatalogEngine {
    fn drop(&mut self) {
        self.scheduler.stop_auto_sync();
    }
}
