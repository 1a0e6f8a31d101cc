//! Durable catalog storage.
//!
//! The store holds categories, products and persisted sync bookkeeping.
//! It knows nothing about networking or freshness. Every batch write is
//! one transaction: it commits whole or leaves the prior state in place.

pub mod redb_store;

use thiserror::Error;

use crate::models::{Category, Product};
use crate::sync::SyncRecord;

pub use redb_store::RedbCatalogStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row counts. Cheap to compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub categories: u64,
    pub products: u64,
}

/// Contract of the durable catalog store.
///
/// "Not found" is never an error: lookups return `None` or an empty list.
/// Writes are upserts keyed by id, so replaying a batch is harmless.
pub trait CatalogStore: Send + Sync {
    fn get_category(&self, id: u64) -> StoreResult<Option<Category>>;

    fn list_categories(&self, active_only: bool) -> StoreResult<Vec<Category>>;

    fn get_product(&self, id: u64) -> StoreResult<Option<Product>>;

    fn list_products_by_category(&self, category_id: u64) -> StoreResult<Vec<Product>>;

    /// Case-insensitive match of every whitespace-separated token against
    /// name, brand and SKU. A blank query matches nothing.
    fn search_products(&self, query: &str) -> StoreResult<Vec<Product>>;

    fn upsert_categories(&self, batch: &[Category]) -> StoreResult<()>;

    fn upsert_products(&self, batch: &[Product]) -> StoreResult<()>;

    fn stats(&self) -> StoreResult<StoreStats>;

    fn load_sync_records(&self) -> StoreResult<Vec<SyncRecord>>;

    fn save_sync_record(&self, record: &SyncRecord) -> StoreResult<()>;
}
