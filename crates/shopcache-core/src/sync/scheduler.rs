//! Sync scheduler: fetches from the catalog service and writes through to
//! the store.
//!
//! Every sync mode runs under its scope's single-flight slot and in-flight
//! guard. A failed fetch writes nothing, so the store keeps its last good
//! state. Retrying is left to callers; the auto-sync loop retries on its
//! next tick.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::flight::SingleFlight;
use super::tracker::{InFlightGuard, SyncTracker};
use super::SyncScope;
use crate::api::{CatalogSource, FetchMode};
use crate::error::{CatalogError, CatalogResult};
use crate::store::CatalogStore;

/// Default cap on simultaneous category fetches.
pub const DEFAULT_MAX_CONCURRENT_SYNCS: usize = 4;

/// Default page size for quick syncs.
pub const DEFAULT_QUICK_PAGE_SIZE: usize = 24;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub quick_page_size: usize,
    /// Staleness threshold used by smart sync for per-category scopes.
    pub category_ttl: chrono::Duration,
    pub auto_sync_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_SYNCS,
            quick_page_size: DEFAULT_QUICK_PAGE_SIZE,
            category_ttl: chrono::Duration::hours(1),
            auto_sync_interval: Duration::from_secs(15 * 60),
        }
    }
}

/// What one sync wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub scope: SyncScope,
    pub categories: usize,
    pub products: usize,
    /// Category scopes that failed during a full sync.
    pub failed: Vec<SyncScope>,
    /// True when no fetch ran for this caller: it was folded into a sync
    /// already running, or the scope turned out to be fresh already.
    pub joined: bool,
}

impl SyncOutcome {
    fn new(scope: SyncScope) -> Self {
        Self {
            scope,
            categories: 0,
            products: 0,
            failed: Vec::new(),
            joined: false,
        }
    }
}

/// Result of one smart sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub synced: Vec<SyncScope>,
    /// Scopes still within their TTL.
    pub fresh: Vec<SyncScope>,
    /// Scopes folded into a sync that was already running.
    pub skipped: Vec<SyncScope>,
    pub failed: Vec<(SyncScope, CatalogError)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct AutoSyncHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    categories: Vec<u64>,
}

pub struct SyncScheduler {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn CatalogStore>,
    tracker: Arc<SyncTracker>,
    flights: SingleFlight<SyncScope, SyncOutcome>,
    config: SchedulerConfig,
    auto_sync: Mutex<Option<AutoSyncHandle>>,
    /// Stale-while-revalidate refreshes not yet awaited by `shutdown`.
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn CatalogStore>,
        tracker: Arc<SyncTracker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            tracker,
            flights: SingleFlight::new(),
            config,
            auto_sync: Mutex::new(None),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn is_in_flight(&self, scope: SyncScope) -> bool {
        self.flights.is_in_flight(&scope)
    }

    // =========================================================================
    // Sync modes
    // =========================================================================

    /// Fetch the category tree, then every active category's products with
    /// bounded concurrency. Category failures are isolated and listed in
    /// the outcome; scope "all" only counts as synced if none failed.
    pub async fn full_sync(self: &Arc<Self>) -> CatalogResult<SyncOutcome> {
        self.run_full(None).await
    }

    /// Fetch every product of one category.
    pub async fn sync_category(self: &Arc<Self>, category_id: u64) -> CatalogResult<SyncOutcome> {
        self.run_products(SyncScope::Category(category_id), category_id, FetchMode::Full, None)
            .await
    }

    /// Reduced refresh of one category for interactive latency budgets.
    pub async fn quick_sync(self: &Arc<Self>, category_id: u64) -> CatalogResult<SyncOutcome> {
        let mode = FetchMode::Quick {
            limit: self.config.quick_page_size.max(1),
        };
        self.run_products(SyncScope::Quick(category_id), category_id, mode, None)
            .await
    }

    /// Sync `scope` unless it is younger than `ttl`. Freshness is checked
    /// inside the scope's single-flight slot, so a caller that raced a
    /// sync which has just finished does not fetch again.
    pub async fn sync_if_stale(
        self: &Arc<Self>,
        scope: SyncScope,
        ttl: chrono::Duration,
    ) -> CatalogResult<SyncOutcome> {
        match scope {
            SyncScope::All => self.run_full(Some(ttl)).await,
            SyncScope::Category(id) => self.run_products(scope, id, FetchMode::Full, Some(ttl)).await,
            SyncScope::Quick(id) => {
                let mode = FetchMode::Quick {
                    limit: self.config.quick_page_size.max(1),
                };
                self.run_products(scope, id, mode, Some(ttl)).await
            }
        }
    }

    /// Start `sync_if_stale` on a background task. `shutdown` waits for it.
    pub fn refresh_in_background(self: &Arc<Self>, scope: SyncScope, ttl: chrono::Duration) {
        if self.flights.is_in_flight(&scope) {
            return;
        }
        debug!(scope = %scope, "Local data stale, refreshing in background");
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Err(e) = this.sync_if_stale(scope, ttl).await {
                debug!(scope = %scope, error = %e, "Background sync did not complete");
            }
        });

        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    async fn run_full(self: &Arc<Self>, fresh_within: Option<chrono::Duration>) -> CatalogResult<SyncOutcome> {
        self.run_scope(SyncScope::All, fresh_within, |this| async move {
            let categories = this.catalog.fetch_categories().await.map_err(CatalogError::from)?;
            this.store.upsert_categories(&categories)?;
            info!(count = categories.len(), "Categories written");

            let ids: Vec<u64> = categories.iter().filter(|c| c.active).map(|c| c.id).collect();
            let results: Vec<(u64, CatalogResult<SyncOutcome>)> = stream::iter(ids)
                .map(|id| {
                    let this = Arc::clone(&this);
                    async move { (id, this.sync_category(id).await) }
                })
                .buffer_unordered(this.config.max_concurrent.max(1))
                .collect()
                .await;

            let mut outcome = SyncOutcome::new(SyncScope::All);
            outcome.categories = categories.len();
            for (id, result) in results {
                match result {
                    Ok(category) => outcome.products += category.products,
                    Err(e) => {
                        debug!(category_id = id, error = %e, "Category failed during full sync");
                        outcome.failed.push(SyncScope::Category(id));
                    }
                }
            }
            outcome.failed.sort();
            Ok(outcome)
        })
        .await
    }

    async fn run_products(
        self: &Arc<Self>,
        scope: SyncScope,
        category_id: u64,
        mode: FetchMode,
        fresh_within: Option<chrono::Duration>,
    ) -> CatalogResult<SyncOutcome> {
        self.run_scope(scope, fresh_within, move |this| async move {
            this.write_through_products(scope, category_id, mode).await
        })
        .await
    }

    /// Sync only the categories whose scope is stale. Categories already
    /// being synced are reported as skipped rather than waited on.
    pub async fn smart_sync(self: &Arc<Self>, category_ids: &[u64]) -> SyncReport {
        let ttl = self.config.category_ttl;
        let mut report = SyncReport::default();
        let mut due = Vec::new();

        for &id in category_ids {
            let scope = SyncScope::Category(id);
            if !self.tracker.needs_sync(scope, ttl) {
                report.fresh.push(scope);
            } else if self.flights.is_in_flight(&scope) {
                report.skipped.push(scope);
            } else {
                due.push(id);
            }
        }

        let results: Vec<(u64, CatalogResult<SyncOutcome>)> = stream::iter(due)
            .map(|id| {
                let this = Arc::clone(self);
                async move { (id, this.sync_if_stale(SyncScope::Category(id), ttl).await) }
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        for (id, result) in results {
            let scope = SyncScope::Category(id);
            match result {
                Ok(outcome) if outcome.joined => report.skipped.push(scope),
                Ok(_) => report.synced.push(scope),
                Err(e) if e.is_informational() => report.skipped.push(scope),
                Err(e) => report.failed.push((scope, e)),
            }
        }

        info!(
            synced = report.synced.len(),
            fresh = report.fresh.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Smart sync pass complete"
        );
        report
    }

    async fn write_through_products(
        &self,
        scope: SyncScope,
        category_id: u64,
        mode: FetchMode,
    ) -> CatalogResult<SyncOutcome> {
        let mut products = match self.catalog.fetch_products(category_id, mode).await {
            Ok(products) => products,
            Err(e) => {
                let err = CatalogError::from(e);
                if matches!(err, CatalogError::MalformedResponse(_)) {
                    warn!(category_id, error = %err, "Malformed catalog payload, keeping existing data");
                }
                return Err(err);
            }
        };

        if matches!(mode, FetchMode::Quick { .. }) {
            // Quick payloads carry fewer fields; keep what a full sync stored
            for product in products.iter_mut() {
                if let Some(existing) = self.store.get_product(product.id)? {
                    product.merge_missing_from(&existing);
                }
            }
        }

        self.store.upsert_products(&products)?;

        let mut outcome = SyncOutcome::new(scope);
        outcome.products = products.len();
        Ok(outcome)
    }

    /// Run `work` as the single sync for `scope`, or join the one running.
    /// With `fresh_within`, a scope synced within that window is left alone.
    async fn run_scope<F, Fut>(
        self: &Arc<Self>,
        scope: SyncScope,
        fresh_within: Option<chrono::Duration>,
        work: F,
    ) -> CatalogResult<SyncOutcome>
    where
        F: FnOnce(Arc<Self>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = CatalogResult<SyncOutcome>> + Send + 'static,
    {
        let this = Arc::clone(self);
        let flight = self
            .flights
            .run(scope, async move {
                if let Some(ttl) = fresh_within {
                    if !this.tracker.needs_sync(scope, ttl) {
                        debug!(scope = %scope, "Scope already fresh, nothing to fetch");
                        let mut outcome = SyncOutcome::new(scope);
                        outcome.joined = true;
                        return Ok(outcome);
                    }
                }

                let Some(guard) = InFlightGuard::acquire(&this.tracker, scope) else {
                    return Err(CatalogError::ConcurrentSyncSkipped(scope));
                };

                info!(scope = %scope, "Sync started");
                let result = work(Arc::clone(&this)).await;
                match &result {
                    Ok(outcome) if outcome.failed.is_empty() => {
                        info!(scope = %scope, categories = outcome.categories, products = outcome.products, "Sync complete");
                        guard.succeed();
                    }
                    Ok(outcome) => {
                        warn!(scope = %scope, failed = outcome.failed.len(), "Sync finished with failures");
                        guard.fail(&CatalogError::NetworkFailure(format!(
                            "{} categories failed",
                            outcome.failed.len()
                        )));
                    }
                    Err(e) => {
                        warn!(scope = %scope, error = %e, "Sync failed");
                        guard.fail(e);
                    }
                }
                result
            })
            .await;

        flight.result.map(|mut outcome| {
            outcome.joined |= flight.joined;
            outcome
        })
    }

    // =========================================================================
    // Auto-sync loop
    // =========================================================================

    /// Start a periodic smart sync over `categories`. Restarting cancels
    /// the previous loop first.
    pub fn start_auto_sync(self: &Arc<Self>, categories: Vec<u64>) {
        let mut slot = self.auto_sync.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            debug!(categories = previous.categories.len(), "Replacing running auto-sync loop");
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).auto_sync_loop(categories.clone(), token.clone()));
        *slot = Some(AutoSyncHandle {
            token,
            task,
            categories,
        });
    }

    /// Cancel the loop. Safe to call when nothing is running. A pass that
    /// is already underway finishes, but no further tick is scheduled.
    pub fn stop_auto_sync(&self) -> bool {
        let handle = self.auto_sync.lock().unwrap_or_else(|e| e.into_inner()).take();
        match handle {
            Some(handle) => {
                handle.token.cancel();
                info!("Auto-sync stop requested");
                true
            }
            None => false,
        }
    }

    pub fn is_auto_sync_running(&self) -> bool {
        self.auto_sync
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.token.is_cancelled() && !h.task.is_finished())
    }

    pub fn auto_sync_categories(&self) -> Vec<u64> {
        self.auto_sync
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|h| h.categories.clone())
            .unwrap_or_default()
    }

    /// Stop the loop, then wait for background refreshes and every sync
    /// still holding a single-flight slot. Afterwards no scope is in flight.
    pub async fn shutdown(&self) {
        let handle = self.auto_sync.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.token.cancel();
            if let Err(e) = handle.task.await {
                warn!(error = %e, "Auto-sync task ended abnormally");
            }
        }

        loop {
            let pending = std::mem::take(&mut *self.background.lock().unwrap_or_else(|e| e.into_inner()));
            if pending.is_empty() {
                break;
            }
            debug!(count = pending.len(), "Waiting for background syncs");
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Background sync task ended abnormally");
                }
            }
        }

        self.flights.drain().await;
    }

    async fn auto_sync_loop(self: Arc<Self>, categories: Vec<u64>, token: CancellationToken) {
        let period = self.config.auto_sync_interval.max(Duration::from_secs(1));
        info!(categories = categories.len(), interval_secs = period.as_secs(), "Auto-sync started");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.smart_sync(&categories).await;
                    if !report.is_clean() {
                        debug!(failed = report.failed.len(), "Auto-sync pass had failures, will retry next tick");
                    }
                }
            }
        }

        info!("Auto-sync stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Product;
    use crate::store::RedbCatalogStore;
    use crate::testing::{sample_category, sample_product, MockCatalog};

    struct Fixture {
        scheduler: Arc<SyncScheduler>,
        catalog: Arc<MockCatalog>,
        store: Arc<RedbCatalogStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(catalog: MockCatalog, config: SchedulerConfig) -> Fixture {
        let catalog = Arc::new(catalog);
        let store = Arc::new(RedbCatalogStore::open_in_memory().expect("store"));
        let clock = Arc::new(ManualClock::default());
        let tracker = Arc::new(SyncTracker::new(store.clone(), clock.clone()));
        let scheduler = Arc::new(SyncScheduler::new(catalog.clone(), store.clone(), tracker, config));
        Fixture {
            scheduler,
            catalog,
            store,
            clock,
        }
    }

    fn ten_categories() -> MockCatalog {
        let catalog = MockCatalog::new();
        for id in 1..=10 {
            catalog.add_category(sample_category(id, &format!("Cat {id}"), None));
            catalog.set_products(id, vec![sample_product(id * 100, id, "A"), sample_product(id * 100 + 1, id, "B")]);
        }
        catalog
    }

    #[tokio::test]
    async fn test_category_sync_writes_through() {
        let f = fixture(ten_categories(), SchedulerConfig::default());
        let outcome = f.scheduler.sync_category(3).await.expect("sync");

        assert_eq!(outcome.scope, SyncScope::Category(3));
        assert_eq!(outcome.products, 2);
        assert!(!outcome.joined);
        assert_eq!(f.store.list_products_by_category(3).expect("list").len(), 2);
        assert!(!f.scheduler.tracker().needs_sync(SyncScope::Category(3), chrono::Duration::hours(1)));
        assert!(!f.scheduler.tracker().is_in_flight(SyncScope::Category(3)));
    }

    #[tokio::test]
    async fn test_full_sync_isolates_failures() {
        let catalog = ten_categories();
        catalog.fail_products_for(3);
        let f = fixture(catalog, SchedulerConfig::default());

        let outcome = f.scheduler.full_sync().await.expect("full sync");
        assert_eq!(outcome.categories, 10);
        assert_eq!(outcome.products, 18);
        assert_eq!(outcome.failed, vec![SyncScope::Category(3)]);

        for id in (1..=10).filter(|id| *id != 3) {
            assert_eq!(f.store.list_products_by_category(id).expect("list").len(), 2);
        }
        let tracker = f.scheduler.tracker();
        assert!(tracker.needs_sync(SyncScope::All, chrono::Duration::hours(24)));
        assert!(tracker.needs_sync(SyncScope::Category(3), chrono::Duration::hours(1)));
        assert!(!tracker.needs_sync(SyncScope::Category(4), chrono::Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_failed_resync_keeps_existing_rows() {
        let f = fixture(ten_categories(), SchedulerConfig::default());
        f.scheduler.full_sync().await.expect("initial sync");

        f.catalog.fail_products_for(3);
        let err = f.scheduler.sync_category(3).await.expect_err("should fail");
        assert!(matches!(err, CatalogError::NetworkFailure(_)));

        for id in 1..=10 {
            assert_eq!(f.store.list_products_by_category(id).expect("list").len(), 2);
        }
        let record = f.scheduler.tracker().get_record(SyncScope::Category(3)).expect("record");
        assert!(record.last_error.is_some());
        assert!(record.last_success.is_some());
        assert!(!record.in_flight);
    }

    #[tokio::test]
    async fn test_malformed_payload_writes_nothing() {
        let catalog = ten_categories();
        catalog.malformed_products_for(5);
        let f = fixture(catalog, SchedulerConfig::default());

        let err = f.scheduler.sync_category(5).await.expect_err("malformed");
        assert!(matches!(err, CatalogError::MalformedResponse(_)));
        assert!(f.store.list_products_by_category(5).expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_full_sync_fails_when_tree_unavailable() {
        let catalog = ten_categories();
        catalog.fail_categories();
        let f = fixture(catalog, SchedulerConfig::default());

        assert!(f.scheduler.full_sync().await.is_err());
        assert_eq!(f.store.stats().expect("stats").categories, 0);
        assert!(!f.scheduler.tracker().is_in_flight(SyncScope::All));
    }

    #[tokio::test]
    async fn test_concurrent_category_syncs_share_one_fetch() {
        let catalog = ten_categories();
        catalog.set_delay(Duration::from_millis(20));
        let f = fixture(catalog, SchedulerConfig::default());

        let calls = (0..10).map(|_| {
            let scheduler = Arc::clone(&f.scheduler);
            async move { scheduler.sync_category(7).await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(f.catalog.product_calls(7), 1);
        assert!(results.iter().all(|r| r.as_ref().is_ok_and(|o| o.products == 2)));
        assert_eq!(results.iter().filter(|r| r.as_ref().is_ok_and(|o| o.joined)).count(), 9);
    }

    #[tokio::test]
    async fn test_sync_if_stale_skips_fresh_scope() {
        let f = fixture(ten_categories(), SchedulerConfig::default());
        let scope = SyncScope::Category(2);
        let ttl = chrono::Duration::hours(1);

        let first = f.scheduler.sync_if_stale(scope, ttl).await.expect("first");
        assert!(!first.joined);
        assert_eq!(first.products, 2);

        let second = f.scheduler.sync_if_stale(scope, ttl).await.expect("second");
        assert!(second.joined);
        assert_eq!(second.products, 0);
        assert_eq!(f.catalog.product_calls(2), 1);

        f.clock.advance(chrono::Duration::minutes(61));
        let third = f.scheduler.sync_if_stale(scope, ttl).await.expect("third");
        assert!(!third.joined);
        assert_eq!(f.catalog.product_calls(2), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_settles_background_refresh() {
        let catalog = ten_categories();
        catalog.set_delay(Duration::from_millis(500));
        let f = fixture(catalog, SchedulerConfig::default());

        f.scheduler.refresh_in_background(SyncScope::Category(6), chrono::Duration::hours(1));
        f.scheduler.shutdown().await;

        assert_eq!(f.catalog.product_calls(6), 1);
        assert!(!f.scheduler.is_in_flight(SyncScope::Category(6)));
        assert!(!f.scheduler.tracker().is_in_flight(SyncScope::Category(6)));
        assert_eq!(f.store.list_products_by_category(6).expect("list").len(), 2);
    }

    #[tokio::test]
    async fn test_quick_sync_preserves_full_fields() {
        let catalog = ten_categories();
        let f = fixture(catalog, SchedulerConfig::default());
        let mut rich = sample_product(100, 1, "A");
        rich.brand_name = Some("Nordika".to_string());
        rich.sku = "A-100".to_string();
        f.store.upsert_products(&[rich]).expect("seed");

        let sparse = Product {
            brand_name: None,
            sku: String::new(),
            ..sample_product(100, 1, "A renamed")
        };
        f.catalog.set_products(1, vec![sparse]);

        let outcome = f.scheduler.quick_sync(1).await.expect("quick");
        assert_eq!(outcome.scope, SyncScope::Quick(1));

        let stored = f.store.get_product(100).expect("get").expect("present");
        assert_eq!(stored.name, "A renamed");
        assert_eq!(stored.brand_name.as_deref(), Some("Nordika"));
        assert_eq!(stored.sku, "A-100");
        assert_eq!(
            f.catalog.last_mode(1),
            Some(FetchMode::Quick {
                limit: DEFAULT_QUICK_PAGE_SIZE
            })
        );
    }

    #[tokio::test]
    async fn test_smart_sync_only_touches_stale_scopes() {
        let f = fixture(ten_categories(), SchedulerConfig::default());
        f.scheduler.sync_category(1).await.expect("sync 1");
        f.clock.advance(chrono::Duration::minutes(30));

        let report = f.scheduler.smart_sync(&[1, 2, 3]).await;
        assert_eq!(report.fresh, vec![SyncScope::Category(1)]);
        let mut synced = report.synced.clone();
        synced.sort();
        assert_eq!(synced, vec![SyncScope::Category(2), SyncScope::Category(3)]);
        assert_eq!(f.catalog.product_calls(1), 1);

        f.clock.advance(chrono::Duration::minutes(31));
        let report = f.scheduler.smart_sync(&[1, 2, 3]).await;
        assert_eq!(report.fresh.len(), 2);
        assert_eq!(report.synced, vec![SyncScope::Category(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_sync_stops_fetching_after_stop() {
        let catalog = ten_categories();
        // Failing scopes stay stale, so every tick fetches
        catalog.fail_products_for(2);
        let config = SchedulerConfig {
            auto_sync_interval: Duration::from_secs(60),
            ..Default::default()
        };
        let f = fixture(catalog, config);

        f.scheduler.start_auto_sync(vec![2]);
        assert!(f.scheduler.is_auto_sync_running());

        tokio::time::sleep(Duration::from_secs(150)).await;
        let before_stop = f.catalog.product_calls(2);
        assert_eq!(before_stop, 3);

        assert!(f.scheduler.stop_auto_sync());
        assert!(!f.scheduler.is_auto_sync_running());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(f.catalog.product_calls(2), before_stop);
        // Stopping again is harmless
        assert!(!f.scheduler.stop_auto_sync());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_loop() {
        let catalog = ten_categories();
        catalog.fail_products_for(4);
        catalog.fail_products_for(5);
        let config = SchedulerConfig {
            auto_sync_interval: Duration::from_secs(60),
            ..Default::default()
        };
        let f = fixture(catalog, config);

        f.scheduler.start_auto_sync(vec![4]);
        tokio::time::sleep(Duration::from_secs(30)).await;
        f.scheduler.start_auto_sync(vec![5]);
        assert_eq!(f.scheduler.auto_sync_categories(), vec![5]);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(f.catalog.product_calls(4), 1);
        assert!(f.catalog.product_calls(5) >= 3);

        f.scheduler.shutdown().await;
        assert!(!f.scheduler.is_auto_sync_running());
    }
}
