//! Wire formats of the catalog and pricing services and their conversion
//! into domain models. Internal to the API layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::source::PriceBatch;
use super::ApiError;
use crate::models::{Category, LastKnown, MediaRef, PriceEntry, Product, Visibility};

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ApiCategory {
    #[serde(rename = "id_categoria")]
    id: u64,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "activo", default = "default_true", deserialize_with = "flag")]
    active: bool,
    #[serde(rename = "id_categoria_padre", default)]
    parent_id: Option<u64>,
}

impl ApiCategory {
    fn into_category(self) -> Category {
        // 0 and self-references both mean "top level" upstream
        let parent_id = self.parent_id.filter(|p| *p != 0 && *p != self.id);
        Category {
            id: self.id,
            name: self.name.trim().to_string(),
            active: self.active,
            parent_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiProduct {
    #[serde(rename = "id_producto")]
    id: u64,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "id_categoria", default)]
    category_id: Option<u64>,
    #[serde(rename = "id_marca", default)]
    brand_id: Option<u64>,
    #[serde(rename = "marca", default)]
    brand_name: Option<String>,
    #[serde(rename = "referencia", default)]
    sku: Option<String>,
    #[serde(rename = "id_imagen", default)]
    image_id: Option<u64>,
    #[serde(default)]
    extension1: Option<String>,
    #[serde(default)]
    extension2: Option<String>,
    #[serde(default = "default_true", deserialize_with = "flag")]
    visible_online: bool,
    #[serde(rename = "destacado", default, deserialize_with = "flag")]
    featured: bool,
    #[serde(rename = "novedad", default, deserialize_with = "flag")]
    new_arrival: bool,
    #[serde(rename = "precio_venta", default)]
    price: Option<Decimal>,
    #[serde(rename = "precio_venta_online", default)]
    online_price: Option<Decimal>,
    #[serde(default)]
    stock: Option<i64>,
}

impl ApiProduct {
    fn into_product(self, requested_category: u64) -> Product {
        let media = self.image_id.map(|image_id| {
            MediaRef::new(image_id, [self.extension1, self.extension2].into_iter().flatten())
        });
        Product {
            id: self.id,
            name: self.name.trim().to_string(),
            category_id: self.category_id.unwrap_or(requested_category),
            brand_id: self.brand_id,
            brand_name: self.brand_name.filter(|b| !b.trim().is_empty()),
            sku: self.sku.unwrap_or_default(),
            media,
            visibility: Visibility {
                online: self.visible_online,
                featured: self.featured,
                new_arrival: self.new_arrival,
            },
            last_known: LastKnown {
                price: self.price,
                online_price: self.online_price,
                stock: self.stock,
            },
        }
    }
}

/// Some endpoints wrap their arrays in an object.
#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    #[serde(default, alias = "categories")]
    categorias: Option<Vec<ApiCategory>>,
    #[serde(default, alias = "products")]
    productos: Option<Vec<ApiProduct>>,
}

fn default_true() -> bool {
    true
}

/// Accepts `true`/`false` as well as `1`/`0`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

pub(crate) fn parse_categories(body: &str) -> Result<Vec<Category>, ApiError> {
    let items = match serde_json::from_str::<Vec<ApiCategory>>(body) {
        Ok(items) => items,
        Err(array_err) => match serde_json::from_str::<CatalogEnvelope>(body) {
            Ok(CatalogEnvelope {
                categorias: Some(items),
                ..
            }) => items,
            _ => {
                return Err(ApiError::InvalidResponse(format!(
                    "Categories payload: {}",
                    array_err
                )))
            }
        },
    };
    debug!(count = items.len(), "Parsed categories");
    Ok(items.into_iter().map(ApiCategory::into_category).collect())
}

pub(crate) fn parse_products(body: &str, category_id: u64) -> Result<Vec<Product>, ApiError> {
    let items = match serde_json::from_str::<Vec<ApiProduct>>(body) {
        Ok(items) => items,
        Err(array_err) => match serde_json::from_str::<CatalogEnvelope>(body) {
            Ok(CatalogEnvelope {
                productos: Some(items),
                ..
            }) => items,
            _ => {
                return Err(ApiError::InvalidResponse(format!(
                    "Products payload for category {}: {}",
                    category_id, array_err
                )))
            }
        },
    };
    debug!(category_id, count = items.len(), "Parsed products");
    Ok(items
        .into_iter()
        .map(|p| p.into_product(category_id))
        .collect())
}

// ============================================================================
// Pricing
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ApiPriceRow {
    id_producto: u64,
    precio_venta: Decimal,
    #[serde(default)]
    precio_venta_online: Option<Decimal>,
    #[serde(default)]
    precio_promocion_online: Option<Decimal>,
    #[serde(rename = "fecha_Ini_promocion_online", default)]
    promo_start_ms: Option<i64>,
    #[serde(rename = "fecha_fin_promocion_online", default)]
    promo_end_ms: Option<i64>,
    #[serde(default)]
    stock: Option<i64>,
}

impl ApiPriceRow {
    fn into_entry(self, fetched_at: DateTime<Utc>) -> PriceEntry {
        PriceEntry {
            product_id: self.id_producto,
            base_price: self.precio_venta,
            online_price: self.precio_venta_online,
            promo_price: self.precio_promocion_online,
            promo_start: self.promo_start_ms.and_then(DateTime::from_timestamp_millis),
            promo_end: self.promo_end_ms.and_then(DateTime::from_timestamp_millis),
            stock: self.stock,
            fetched_at,
        }
    }
}

/// Parse a pricing response. Never fails: an empty or unrecognizable body
/// is zero entries, and individual bad rows are skipped.
pub(crate) fn parse_price_batch(body: &str, category_id: u64, fetched_at: DateTime<Utc>) -> PriceBatch {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        debug!(category_id, "Empty price payload");
        return PriceBatch::default();
    }

    let (server_time, rows) = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(rows)) => (None, rows),
        Ok(Value::Object(mut obj)) => {
            let server_time = obj
                .get("timestamp")
                .and_then(Value::as_i64)
                .and_then(DateTime::from_timestamp_millis);
            let rows = match obj.remove("precios").or_else(|| obj.remove("data")) {
                Some(Value::Array(rows)) => rows,
                _ => {
                    warn!(category_id, "Price payload has no price list, treating as zero entries");
                    Vec::new()
                }
            };
            (server_time, rows)
        }
        Ok(_) | Err(_) => {
            warn!(category_id, "Unparseable price payload, treating as zero entries");
            return PriceBatch::default();
        }
    };

    let total = rows.len();
    let entries: Vec<PriceEntry> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<ApiPriceRow>(row) {
            Ok(row) => Some(row.into_entry(fetched_at)),
            Err(e) => {
                debug!(category_id, error = %e, "Skipping malformed price row");
                None
            }
        })
        .collect();

    if entries.len() < total {
        warn!(category_id, kept = entries.len(), total, "Dropped malformed price rows");
    }

    PriceBatch {
        server_time,
        entries,
    }
}
