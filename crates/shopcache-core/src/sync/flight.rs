//! Single-flight registry: concurrent requests for the same key share one
//! running operation and all receive its result.
//!
//! The operation runs on its own task, so callers that stop waiting do not
//! cancel it. The key is released by the task itself, before its result
//! becomes visible, so a caller arriving after completion starts afresh.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};

type SharedResult<T> = Shared<BoxFuture<'static, CatalogResult<T>>>;

/// Outcome of a single-flight call.
#[derive(Debug, Clone)]
pub struct Flight<T> {
    pub result: CatalogResult<T>,
    /// True when this caller joined an operation someone else started.
    pub joined: bool,
}

pub struct SingleFlight<K, T>
where
    K: Eq + Hash,
{
    inflight: Arc<DashMap<K, SharedResult<T>>>,
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

/// Removes the key when the task finishes, panics, or is aborted.
struct ReleaseOnDrop<K: Eq + Hash, T> {
    registry: Arc<DashMap<K, SharedResult<T>>>,
    key: K,
}

impl<K: Eq + Hash, T> Drop for ReleaseOnDrop<K, T> {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Wait until every operation in flight, including ones started while
    /// waiting, has finished.
    pub async fn drain(&self) {
        loop {
            let pending: Vec<SharedResult<T>> = self.inflight.iter().map(|e| e.value().clone()).collect();
            if pending.is_empty() {
                return;
            }
            debug!(count = pending.len(), "Draining in-flight operations");
            futures::future::join_all(pending).await;
        }
    }

    /// Run `work` for `key`, or wait for the run already in progress.
    pub async fn run<F>(&self, key: K, work: F) -> Flight<T>
    where
        F: Future<Output = CatalogResult<T>> + Send + 'static,
    {
        let (shared, joined) = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), true),
            Entry::Vacant(entry) => {
                let release = ReleaseOnDrop {
                    registry: Arc::clone(&self.inflight),
                    key: key.clone(),
                };
                let handle = tokio::spawn(async move {
                    let _release = release;
                    work.await
                });
                let shared = async move {
                    handle
                        .await
                        .unwrap_or_else(|e| Err(CatalogError::TaskFailed(e.to_string())))
                }
                .boxed()
                .shared();
                entry.insert(shared.clone());
                (shared, false)
            }
        };

        if joined {
            debug!(key = ?key, "Joined in-flight operation");
        }

        Flight {
            result: shared.await,
            joined,
        }
    }
}
