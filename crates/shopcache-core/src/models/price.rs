//! Live price entries and the rules deciding what price a customer sees.
//!
//! [`has_active_promotion`] and [`effective_price`] are the only place
//! those rules live. Every view that shows a price goes through them.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One product's live price data from the pricing service.
///
/// Held only in the overlay cache, never written to the catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct PriceEntry {
    pub product_id: u64,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub base_price: Decimal,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub online_price: Option<Decimal>,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub promo_price: Option<Decimal>,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub promo_start: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub promo_end: Option<DateTime<Utc>>,
    pub stock: Option<i64>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub fetched_at: DateTime<Utc>,
}

impl PriceEntry {
    /// An entry is only usable while younger than the overlay TTL.
    /// Past that it counts as absent, not as last known good.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

/// True only if a positive promotional price exists and `now` falls
/// inside `[promo_start, promo_end]`. A missing bound means no window.
pub fn has_active_promotion(entry: &PriceEntry, now: DateTime<Utc>) -> bool {
    let Some(promo) = entry.promo_price else {
        return false;
    };
    if promo <= Decimal::ZERO {
        return false;
    }
    match (entry.promo_start, entry.promo_end) {
        (Some(start), Some(end)) => start <= now && now <= end,
        _ => false,
    }
}

/// Promotional price if active, else online price if present, else base price.
pub fn effective_price(entry: &PriceEntry, now: DateTime<Utc>) -> Decimal {
    if has_active_promotion(entry, now) {
        if let Some(promo) = entry.promo_price {
            return promo;
        }
    }
    entry.online_price.unwrap_or(entry.base_price)
}
