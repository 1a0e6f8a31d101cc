//! Error taxonomy surfaced by the catalog engine.
//!
//! Lower layers have their own error types (`ApiError` for HTTP,
//! `StoreError` for the embedded database). Everything that crosses the
//! engine boundary is folded into [`CatalogError`], which is `Clone` so a
//! single in-flight sync result can be handed to every waiter.

use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;
use crate::sync::SyncScope;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The durable store could not be read or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A fetch failed or timed out.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The remote payload did not match the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Informational: the request was folded into a sync that was already running.
    #[error("Sync for {0} already in flight")]
    ConcurrentSyncSkipped(SyncScope),

    /// The background task driving a sync panicked or was aborted.
    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl CatalogError {
    /// True for signals that are not failures.
    pub fn is_informational(&self) -> bool {
        matches!(self, CatalogError::ConcurrentSyncSkipped(_))
    }
}

impl From<ApiError> for CatalogError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidResponse(msg) => CatalogError::MalformedResponse(msg),
            other => CatalogError::NetworkFailure(other.to_string()),
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        CatalogError::StorageUnavailable(err.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
