//! Price and inventory overlay.

pub mod cache;

pub use cache::{CategoryPrices, PriceCache, DEFAULT_PRICE_TTL_MINUTES};
