//! Client-resident catalog cache and sync engine for a retail storefront.
//!
//! Products and categories are mirrored into a local redb database and
//! served from there. A sync scheduler keeps the mirror fresh against the
//! remote catalog service, deduplicating concurrent syncs per scope. Live
//! prices and stock come from a separate pricing service and are held in a
//! short-lived in-memory overlay that is joined onto product reads.
//!
//! [`CatalogEngine`] is the entry point:
//!
//! ```no_run
//! # async fn demo() -> Result<(), shopcache_core::CatalogError> {
//! use shopcache_core::{CatalogEngine, EngineConfig};
//!
//! let engine = CatalogEngine::open(EngineConfig::default())?;
//! for item in engine.get_products_by_category(15).await? {
//!     println!("{} {:?}", item.product.name, item.effective_price);
//! }
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod prices;
pub mod store;
pub mod sync;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::CatalogEngine;
pub use error::{CatalogError, CatalogResult};
pub use models::{CategoryNode, EngineStats, EnrichedProduct, FallbackPricePolicy};
pub use sync::{SyncOutcome, SyncReport, SyncScope};
