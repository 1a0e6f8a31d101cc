//! Data models for catalog entities.
//!
//! - `Category`, `CategoryNode`: taxonomy rows and the derived tree
//! - `Product`: catalog rows with non-authoritative last-known pricing
//! - `PriceEntry`: live overlay prices and the customer price rules
//! - View types: `EnrichedProduct`, `EngineStats`

pub mod category;
pub mod price;
pub mod product;
pub mod view;

pub use category::{build_hierarchy, Category, CategoryNode};
pub use price::{effective_price, has_active_promotion, PriceEntry};
pub use product::{LastKnown, MediaRef, Product, Visibility};
pub use view::{EngineStats, EnrichedProduct, FallbackPricePolicy, PriceCacheStats, ScopeStatus};
