//! REST API client module for the remote catalog and pricing services.
//!
//! The catalog service serves the category tree and per-category product
//! lists. The pricing service serves live prices per category and is
//! queried independently.

pub mod client;
pub mod error;
pub mod source;
mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use source::{CatalogSource, FetchMode, PriceBatch, PriceSource};
