//! Per-scope sync bookkeeping: last success, last attempt, in-flight flag.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use super::{SyncRecord, SyncScope};
use crate::clock::Clock;
use crate::error::CatalogError;
use crate::store::CatalogStore;

pub struct SyncTracker {
    records: DashMap<SyncScope, SyncRecord>,
    store: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
}

impl SyncTracker {
    /// Build a tracker seeded from the records persisted in `store`.
    /// A store that cannot be read yields an empty tracker.
    pub fn new(store: Arc<dyn CatalogStore>, clock: Arc<dyn Clock>) -> Self {
        let records = DashMap::new();
        match store.load_sync_records() {
            Ok(loaded) => {
                debug!(count = loaded.len(), "Loaded sync records");
                for record in loaded {
                    records.insert(record.scope, SyncRecord { in_flight: false, ..record });
                }
            }
            Err(e) => warn!(error = %e, "Failed to load sync records, starting empty"),
        }
        Self {
            records,
            store,
            clock,
        }
    }

    /// True when the scope has never succeeded or its last success is
    /// older than `ttl`.
    pub fn needs_sync(&self, scope: SyncScope, ttl: Duration) -> bool {
        match self.records.get(&scope).and_then(|r| r.last_success) {
            Some(last) => self.clock.now() - last > ttl,
            None => true,
        }
    }

    /// Claim the scope. Returns false if a sync for it is already running.
    pub fn mark_in_flight(&self, scope: SyncScope) -> bool {
        let mut record = self
            .records
            .entry(scope)
            .or_insert_with(|| SyncRecord::new(scope));
        if record.in_flight {
            false
        } else {
            record.in_flight = true;
            true
        }
    }

    pub fn mark_done(&self, scope: SyncScope, success: bool) {
        self.finish(scope, success, None);
    }

    pub fn mark_failed(&self, scope: SyncScope, error: &CatalogError) {
        self.finish(scope, false, Some(error.to_string()));
    }

    fn finish(&self, scope: SyncScope, success: bool, error: Option<String>) {
        let now = self.clock.now();
        let snapshot = {
            let mut record = self
                .records
                .entry(scope)
                .or_insert_with(|| SyncRecord::new(scope));
            record.in_flight = false;
            record.last_attempt = Some(now);
            if success {
                record.last_success = Some(now);
                record.last_error = None;
            } else {
                record.last_error = Some(error.unwrap_or_else(|| "sync failed".to_string()));
            }
            record.clone()
        };

        if let Err(e) = self.store.save_sync_record(&snapshot) {
            warn!(scope = %scope, error = %e, "Failed to persist sync record");
        }
    }

    pub fn get_last_sync(&self, scope: SyncScope) -> Option<DateTime<Utc>> {
        self.records.get(&scope).and_then(|r| r.last_success)
    }

    pub fn is_in_flight(&self, scope: SyncScope) -> bool {
        self.records.get(&scope).is_some_and(|r| r.in_flight)
    }

    pub fn get_record(&self, scope: SyncScope) -> Option<SyncRecord> {
        self.records.get(&scope).map(|r| r.clone())
    }

    /// All records, ordered by scope.
    pub fn records(&self) -> Vec<SyncRecord> {
        let mut records: Vec<SyncRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.scope);
        records
    }
}

/// Holds a scope's in-flight claim. Whatever happens to the sync, the
/// claim is released: explicitly via `succeed`/`fail`, or as a recorded
/// failure when the guard is dropped (panic, aborted task).
pub struct InFlightGuard {
    tracker: Arc<SyncTracker>,
    scope: SyncScope,
    finished: bool,
}

impl InFlightGuard {
    /// Returns `None` if the scope is already claimed.
    pub fn acquire(tracker: &Arc<SyncTracker>, scope: SyncScope) -> Option<Self> {
        if tracker.mark_in_flight(scope) {
            Some(Self {
                tracker: Arc::clone(tracker),
                scope,
                finished: false,
            })
        } else {
            None
        }
    }

    pub fn succeed(mut self) {
        self.finished = true;
        self.tracker.mark_done(self.scope, true);
    }

    pub fn fail(mut self, error: &CatalogError) {
        self.finished = true;
        self.tracker.mark_failed(self.scope, error);
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!(scope = %self.scope, "Sync ended without completing, releasing in-flight flag");
            self.tracker
                .mark_failed(self.scope, &CatalogError::TaskFailed("sync interrupted".to_string()));
        }
    }
}
