use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

/// Maximum number of file extensions tried for a product image.
pub const MAX_IMAGE_EXTENSIONS: usize = 2;

/// A catalog product as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub category_id: u64,
    pub brand_id: Option<u64>,
    pub brand_name: Option<String>,
    pub sku: String,
    pub media: Option<MediaRef>,
    pub visibility: Visibility,
    /// Not authoritative. Only used when the price overlay has nothing.
    pub last_known: LastKnown,
}

impl Product {
    /// Fill fields the incoming snapshot left empty from a previously
    /// stored, richer snapshot of the same product.
    pub fn merge_missing_from(&mut self, existing: &Product) {
        if self.id != existing.id {
            return;
        }
        if self.brand_id.is_none() {
            self.brand_id = existing.brand_id;
        }
        if self.brand_name.is_none() {
            self.brand_name = existing.brand_name.clone();
        }
        if self.sku.is_empty() {
            self.sku = existing.sku.clone();
        }
        if self.media.is_none() {
            self.media = existing.media.clone();
        }
        self.last_known.merge_missing_from(&existing.last_known);
    }

    pub fn matches_all(&self, tokens: &[String]) -> bool {
        tokens.iter().all(|token| self.matches(token))
    }

    fn matches(&self, token: &str) -> bool {
        contains_ignore_case(&self.name, token)
            || contains_ignore_case(&self.sku, token)
            || self
                .brand_name
                .as_deref()
                .is_some_and(|brand| contains_ignore_case(brand, token))
    }
}

/// Image reference: one image id, up to two candidate extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct MediaRef {
    pub image_id: u64,
    pub extensions: Vec<String>,
}

impl MediaRef {
    pub fn new(image_id: u64, extensions: impl IntoIterator<Item = String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .take(MAX_IMAGE_EXTENSIONS)
            .collect();
        Self {
            image_id,
            extensions,
        }
    }

    /// Image URLs in the order they should be tried; the first one that
    /// loads wins.
    pub fn candidate_urls(&self, base_url: &str) -> Vec<String> {
        let base = base_url.trim_end_matches('/');
        self.extensions
            .iter()
            .map(|ext| format!("{}/{}.{}", base, self.image_id, ext))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Visibility {
    pub online: bool,
    pub featured: bool,
    pub new_arrival: bool,
}

/// Price and stock as last seen by a catalog sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct LastKnown {
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub price: Option<Decimal>,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub online_price: Option<Decimal>,
    pub stock: Option<i64>,
}

impl LastKnown {
    /// The price a customer would see if nothing live is available.
    pub fn display_price(&self) -> Option<Decimal> {
        self.online_price.or(self.price)
    }

    fn merge_missing_from(&mut self, existing: &LastKnown) {
        if self.price.is_none() {
            self.price = existing.price;
        }
        if self.online_price.is_none() {
            self.online_price = existing.online_price;
        }
        if self.stock.is_none() {
            self.stock = existing.stock;
        }
    }
}
