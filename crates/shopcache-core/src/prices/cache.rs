use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::api::PriceSource;
use crate::clock::Clock;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{PriceCacheStats, PriceEntry};
use crate::sync::SingleFlight;

/// Live prices older than this are treated as absent.
pub const DEFAULT_PRICE_TTL_MINUTES: i64 = 5;

/// One category's live prices, keyed by product id.
#[derive(Debug, Clone)]
pub struct CategoryPrices {
    pub category_id: u64,
    pub fetched_at: DateTime<Utc>,
    entries: HashMap<u64, PriceEntry>,
    generation: Generation,
}

impl CategoryPrices {
    pub fn get(&self, product_id: u64) -> Option<&PriceEntry> {
        self.entries.get(&product_id)
    }

    /// The product's entry, only while it is younger than `ttl`.
    pub fn get_fresh(&self, product_id: u64, now: DateTime<Utc>, ttl: Duration) -> Option<&PriceEntry> {
        self.get(product_id).filter(|entry| entry.is_fresh(now, ttl))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Invalidation counters a batch was fetched under: the global one bumped
/// by `invalidate_all` and the category's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
    global: u64,
    category: u64,
}

/// The cached batches plus the counters that decide which are current.
#[derive(Default)]
struct Overlay {
    batches: DashMap<u64, Arc<CategoryPrices>>,
    global: AtomicU64,
    per_category: DashMap<u64, u64>,
}

impl Overlay {
    fn generation(&self, category_id: u64) -> Generation {
        Generation {
            global: self.global.load(Ordering::SeqCst),
            category: self.per_category.get(&category_id).map(|g| *g).unwrap_or(0),
        }
    }

    /// The category's batch if it is fresh and no invalidation happened
    /// since it was fetched.
    fn current(&self, category_id: u64, now: DateTime<Utc>, ttl: Duration) -> Option<Arc<CategoryPrices>> {
        let generation = self.generation(category_id);
        self.batches
            .get(&category_id)
            .filter(|prices| prices.generation == generation && prices.is_fresh(now, ttl))
            .map(|prices| Arc::clone(prices.value()))
    }

    /// Store a batch unless the category was invalidated while it was
    /// being fetched. Returns whether it was stored.
    fn store(&self, prices: &Arc<CategoryPrices>) -> bool {
        if prices.generation != self.generation(prices.category_id) {
            return false;
        }
        self.batches.insert(prices.category_id, Arc::clone(prices));
        true
    }

    fn invalidate(&self, category_id: u64) -> bool {
        *self.per_category.entry(category_id).or_insert(0) += 1;
        self.batches.remove(&category_id).is_some()
    }

    fn invalidate_all(&self) -> usize {
        self.global.fetch_add(1, Ordering::SeqCst);
        let count = self.batches.len();
        self.batches.clear();
        count
    }
}

/// Short-lived overlay of prices and stock, keyed by category.
///
/// Never persisted. Entries expire by timestamp comparison; nothing evicts
/// them eagerly. Concurrent misses for one category share a single fetch.
/// A fetch that was running when its category got invalidated still
/// answers its waiters, but its batch is never served from the cache.
pub struct PriceCache {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    overlay: Arc<Overlay>,
    flights: SingleFlight<u64, Arc<CategoryPrices>>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            overlay: Arc::new(Overlay::default()),
            flights: SingleFlight::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh prices for a category, fetching only on a miss or expiry.
    pub async fn get_prices_for_category(&self, category_id: u64) -> CatalogResult<Arc<CategoryPrices>> {
        if let Some(hit) = self.peek_category(category_id) {
            return Ok(hit);
        }

        let source = Arc::clone(&self.source);
        let clock = Arc::clone(&self.clock);
        let overlay = Arc::clone(&self.overlay);
        let ttl = self.ttl;
        let flight = self
            .flights
            .run(category_id, async move {
                // A fetch that finished just before this slot opened
                if let Some(hit) = overlay.current(category_id, clock.now(), ttl) {
                    return Ok(hit);
                }

                let generation = overlay.generation(category_id);
                let batch = source.fetch_prices(category_id).await.map_err(CatalogError::from)?;
                let fetched_at = clock.now();
                if let Some(server_time) = batch.server_time {
                    debug!(category_id, skew_secs = (fetched_at - server_time).num_seconds(), "Price batch received");
                }

                let prices = Arc::new(CategoryPrices {
                    category_id,
                    fetched_at,
                    entries: batch
                        .entries
                        .into_iter()
                        .map(|entry| (entry.product_id, PriceEntry { fetched_at, ..entry }))
                        .collect(),
                    generation,
                });
                if overlay.store(&prices) {
                    debug!(category_id, count = prices.len(), "Price overlay refreshed");
                } else {
                    debug!(category_id, "Category invalidated during fetch, batch not cached");
                }
                Ok(prices)
            })
            .await;

        flight.result
    }

    /// Fresh live entry for one product. `None` if the pricing service
    /// had nothing for it.
    pub async fn get_price_for_product(
        &self,
        product_id: u64,
        category_id: u64,
    ) -> CatalogResult<Option<PriceEntry>> {
        let prices = self.get_prices_for_category(category_id).await?;
        let now = self.clock.now();
        Ok(prices.get_fresh(product_id, now, self.ttl).cloned())
    }

    /// Cached prices for a category if still fresh. Never fetches.
    pub fn peek_category(&self, category_id: u64) -> Option<Arc<CategoryPrices>> {
        self.overlay.current(category_id, self.clock.now(), self.ttl)
    }

    /// Cached live entry for a product if still fresh. Never fetches.
    pub fn peek_price(&self, product_id: u64, category_id: u64) -> Option<PriceEntry> {
        let now = self.clock.now();
        self.peek_category(category_id)
            .and_then(|prices| prices.get_fresh(product_id, now, self.ttl).cloned())
    }

    /// Drop the category's batch. A fetch already running for it will not
    /// be cached.
    pub fn invalidate(&self, category_id: u64) {
        if self.overlay.invalidate(category_id) {
            debug!(category_id, "Price overlay invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        let count = self.overlay.invalidate_all();
        debug!(count, "Price overlay cleared");
    }

    /// Occupancy counts, expired categories included until replaced.
    pub fn stats(&self) -> PriceCacheStats {
        self.overlay.batches.iter().fold(PriceCacheStats::default(), |mut stats, prices| {
            stats.categories_cached += 1;
            stats.entry_count += prices.len();
            stats
        })
    }
}
