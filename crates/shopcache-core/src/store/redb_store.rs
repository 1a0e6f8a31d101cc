//! redb-backed catalog store

use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use tracing::debug;

use super::{CatalogStore, StoreResult, StoreStats};
use crate::models::{Category, Product};
use crate::sync::SyncRecord;
use crate::utils::cmp_ignore_case;

/// Categories table: key = category id, value = JSON
const CATEGORIES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("categories");

/// Products table: key = product id, value = JSON
const PRODUCTS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("products");

/// Index: (category_id, product_id) -> ()
const PRODUCTS_BY_CATEGORY_TABLE: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("products_by_category");

/// Sync records table: key = scope key, value = JSON
const SYNC_RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_records");

#[derive(Clone)]
pub struct RedbCatalogStore {
    db: Arc<Database>,
}

impl RedbCatalogStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CATEGORIES_TABLE)?;
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
            let _ = write_txn.open_table(PRODUCTS_BY_CATEGORY_TABLE)?;
            let _ = write_txn.open_table(SYNC_RECORDS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Write a product batch in one transaction. `before_insert` runs for
    /// each row inside the transaction; an error from it, or from any
    /// write, aborts the batch and leaves the prior state untouched.
    fn write_products(
        &self,
        batch: &[Product],
        mut before_insert: impl FnMut(&Product) -> StoreResult<()>,
    ) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PRODUCTS_TABLE)?;
            let mut idx_table = write_txn.open_table(PRODUCTS_BY_CATEGORY_TABLE)?;

            for product in batch {
                before_insert(product)?;

                // A product that moved category must leave its old index slot
                let previous_category = match table.get(product.id)? {
                    Some(guard) => Some(serde_json::from_slice::<Product>(guard.value())?.category_id),
                    None => None,
                };
                if let Some(old) = previous_category {
                    if old != product.category_id {
                        idx_table.remove((old, product.id))?;
                    }
                }

                let value = serde_json::to_vec(product)?;
                table.insert(product.id, value.as_slice())?;
                idx_table.insert((product.category_id, product.id), ())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn all_products(&self) -> StoreResult<Vec<Product>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;

        let mut products = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            products.push(serde_json::from_slice::<Product>(guard.value())?);
        }
        Ok(products)
    }
}

fn sort_by_name(products: &mut [Product]) {
    products.sort_by(|a, b| cmp_ignore_case(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
}

impl CatalogStore for RedbCatalogStore {
    fn get_category(&self, id: u64) -> StoreResult<Option<Category>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CATEGORIES_TABLE)?;

        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_categories(&self, active_only: bool) -> StoreResult<Vec<Category>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CATEGORIES_TABLE)?;

        let mut categories = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            let category: Category = serde_json::from_slice(guard.value())?;
            if !active_only || category.active {
                categories.push(category);
            }
        }
        Ok(categories)
    }

    fn get_product(&self, id: u64) -> StoreResult<Option<Product>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;

        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_products_by_category(&self, category_id: u64) -> StoreResult<Vec<Product>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(PRODUCTS_BY_CATEGORY_TABLE)?;
        let data_table = read_txn.open_table(PRODUCTS_TABLE)?;

        let mut products = Vec::new();
        for result in idx_table.range((category_id, 0u64)..=(category_id, u64::MAX))? {
            let (key, _) = result?;
            let (_, product_id) = key.value();
            if let Some(guard) = data_table.get(product_id)? {
                products.push(serde_json::from_slice::<Product>(guard.value())?);
            }
        }

        sort_by_name(&mut products);
        Ok(products)
    }

    fn search_products(&self, query: &str) -> StoreResult<Vec<Product>> {
        let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: Vec<Product> = self
            .all_products()?
            .into_iter()
            .filter(|p| p.matches_all(&tokens))
            .collect();
        sort_by_name(&mut matches);
        debug!(query, count = matches.len(), "Local product search");
        Ok(matches)
    }

    fn upsert_categories(&self, batch: &[Category]) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CATEGORIES_TABLE)?;
            for category in batch {
                let value = serde_json::to_vec(category)?;
                table.insert(category.id, value.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn upsert_products(&self, batch: &[Product]) -> StoreResult<()> {
        self.write_products(batch, |_| Ok(()))
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let read_txn = self.db.begin_read()?;
        let categories = read_txn.open_table(CATEGORIES_TABLE)?.len()?;
        let products = read_txn.open_table(PRODUCTS_TABLE)?.len()?;
        Ok(StoreStats {
            categories,
            products,
        })
    }

    fn load_sync_records(&self) -> StoreResult<Vec<SyncRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SYNC_RECORDS_TABLE)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            records.push(serde_json::from_slice::<SyncRecord>(guard.value())?);
        }
        Ok(records)
    }

    fn save_sync_record(&self, record: &SyncRecord) -> StoreResult<()> {
        let key = record.scope.to_string();
        let value = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYNC_RECORDS_TABLE)?;
            table.insert(key.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::sync::SyncScope;
    use crate::testing::{sample_category, sample_product};
    use chrono::Utc;

    fn store() -> RedbCatalogStore {
        RedbCatalogStore::open_in_memory().expect("in-memory store")
    }

    fn snapshot(store: &RedbCatalogStore) -> (Vec<Category>, Vec<Product>, StoreStats) {
        (
            store.list_categories(false).expect("categories"),
            store.list_products_by_category(1).expect("products"),
            store.stats().expect("stats"),
        )
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = store();
        let categories = vec![sample_category(1, "Ropa", None), sample_category(2, "Hogar", None)];
        let products = vec![sample_product(10, 1, "Camiseta"), sample_product(11, 1, "Abrigo")];

        store.upsert_categories(&categories).expect("categories");
        store.upsert_products(&products).expect("products");
        let once = snapshot(&store);

        store.upsert_categories(&categories).expect("categories again");
        store.upsert_products(&products).expect("products again");
        let twice = snapshot(&store);

        assert_eq!(once, twice);
        assert_eq!(twice.2, StoreStats { categories: 2, products: 2 });
    }

    #[test]
    fn test_batch_failing_midway_keeps_prior_state() {
        let store = store();
        store
            .upsert_products(&[sample_product(10, 1, "Camiseta"), sample_product(11, 1, "Abrigo")])
            .expect("seed");
        let before = snapshot(&store);

        let batch = vec![
            sample_product(10, 1, "Camiseta Nueva"),
            sample_product(11, 2, "Abrigo"),
            sample_product(12, 1, "Bufanda"),
            sample_product(13, 1, "Gorro"),
        ];
        let mut written = 0;
        let result = store.write_products(&batch, |_| {
            written += 1;
            if written == 3 {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(written, 3);
        assert_eq!(snapshot(&store), before);
        assert!(store.get_product(12).expect("get").is_none());
        assert!(store.list_products_by_category(2).expect("moved").is_empty());

        store.upsert_products(&batch).expect("clean retry");
        assert_eq!(store.stats().expect("stats").products, 4);
        assert_eq!(store.list_products_by_category(2).expect("moved").len(), 1);
    }

    #[test]
    fn test_lookup_missing_is_none() {
        let store = store();
        assert_eq!(store.get_category(99).expect("lookup"), None);
        assert_eq!(store.get_product(99).expect("lookup"), None);
        assert!(store.list_products_by_category(99).expect("lookup").is_empty());
    }

    #[test]
    fn test_list_by_category_sorted_and_scoped() {
        let store = store();
        store
            .upsert_products(&[
                sample_product(1, 5, "zapato"),
                sample_product(2, 5, "Bota"),
                sample_product(3, 6, "Taza"),
            ])
            .expect("upsert");

        let names: Vec<String> = store
            .list_products_by_category(5)
            .expect("list")
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Bota", "zapato"]);
    }

    #[test]
    fn test_product_moving_category_updates_index() {
        let store = store();
        store.upsert_products(&[sample_product(1, 5, "Bota")]).expect("upsert");
        store.upsert_products(&[sample_product(1, 6, "Bota")]).expect("move");

        assert!(store.list_products_by_category(5).expect("old").is_empty());
        assert_eq!(store.list_products_by_category(6).expect("new").len(), 1);
        assert_eq!(store.get_product(1).expect("get").map(|p| p.category_id), Some(6));
    }

    #[test]
    fn test_list_categories_active_only() {
        let store = store();
        let mut archived = sample_category(3, "Archivo", None);
        archived.active = false;
        store
            .upsert_categories(&[sample_category(1, "Ropa", None), archived])
            .expect("upsert");

        assert_eq!(store.list_categories(false).expect("all").len(), 2);
        let active = store.list_categories(true).expect("active");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }

    #[test]
    fn test_search_matches_name_brand_sku() {
        let store = store();
        let mut branded = sample_product(1, 1, "Camiseta Lisa");
        branded.brand_name = Some("Nordika".to_string());
        branded.sku = "CAM-001".to_string();
        store
            .upsert_products(&[branded, sample_product(2, 1, "Pantalon")])
            .expect("upsert");

        assert_eq!(store.search_products("camiseta").expect("name").len(), 1);
        assert_eq!(store.search_products("NORDIKA").expect("brand").len(), 1);
        assert_eq!(store.search_products("cam-0").expect("sku").len(), 1);
        assert_eq!(store.search_products("lisa nordika").expect("tokens").len(), 1);
        assert!(store.search_products("lisa roja").expect("no match").is_empty());
        assert!(store.search_products("   ").expect("blank").is_empty());
    }

    #[test]
    fn test_sync_records_roundtrip() {
        let store = store();
        let mut record = SyncRecord::new(SyncScope::Category(4));
        record.last_success = Some(Utc::now());
        record.in_flight = true;
        store.save_sync_record(&record).expect("save");

        let loaded = store.load_sync_records().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].scope, SyncScope::Category(4));
        assert_eq!(loaded[0].last_success, record.last_success);
        assert!(!loaded[0].in_flight);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = std::env::temp_dir().join(format!("shopcache-store-{}", std::process::id()));
        let path = dir.join("catalog.redb");
        {
            let store = RedbCatalogStore::open(&path).expect("open");
            store.upsert_categories(&[sample_category(1, "Ropa", None)]).expect("upsert");
        }
        {
            let store = RedbCatalogStore::open(&path).expect("reopen");
            assert_eq!(store.get_category(1).expect("get").map(|c| c.name), Some("Ropa".to_string()));
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
