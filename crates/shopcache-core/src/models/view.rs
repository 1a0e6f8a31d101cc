//! Read-side view types handed to UI, cart and order layers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::{effective_price, has_active_promotion, PriceEntry};
use super::product::Product;

/// Whether a product's stored, non-authoritative price may be shown as
/// the customer price when no live price is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPricePolicy {
    #[default]
    ShowToCustomer,
    DiagnosticsOnly,
}

/// A product joined with its live price, if one was available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct EnrichedProduct {
    pub product: Product,
    /// True when the price fields come from a fresh overlay entry.
    pub prices_updated: bool,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub effective_price: Option<Decimal>,
    pub has_promotion: bool,
    pub live: Option<PriceEntry>,
    /// The stored last-known price, always populated for diagnostics.
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub fallback_price: Option<Decimal>,
    pub stock: Option<i64>,
}

impl EnrichedProduct {
    pub fn new(
        product: Product,
        live: Option<PriceEntry>,
        now: DateTime<Utc>,
        policy: FallbackPricePolicy,
    ) -> Self {
        let fallback_price = product.last_known.display_price();
        match live {
            Some(entry) => Self {
                prices_updated: true,
                effective_price: Some(effective_price(&entry, now)),
                has_promotion: has_active_promotion(&entry, now),
                stock: entry.stock.or(product.last_known.stock),
                fallback_price,
                live: Some(entry),
                product,
            },
            None => Self {
                prices_updated: false,
                effective_price: match policy {
                    FallbackPricePolicy::ShowToCustomer => fallback_price,
                    FallbackPricePolicy::DiagnosticsOnly => None,
                },
                has_promotion: false,
                stock: product.last_known.stock,
                fallback_price,
                live: None,
                product,
            },
        }
    }
}

/// Freshness of one sync scope, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct ScopeStatus {
    pub scope: String,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_success: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub in_flight: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct PriceCacheStats {
    pub categories_cached: usize,
    pub entry_count: usize,
}

/// Snapshot for the admin diagnostics view. Built without network calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct EngineStats {
    pub storage_available: bool,
    pub total_categories: u64,
    pub total_products: u64,
    pub scopes: Vec<ScopeStatus>,
    pub price_cache: PriceCacheStats,
    pub auto_sync_running: bool,
}
