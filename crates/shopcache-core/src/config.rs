//! Engine configuration.
//!
//! Stored as JSON at `~/.config/shopcache/config.json`. Every field has a
//! default, so a missing or partial file is fine. A few `SHOPCACHE_*`
//! environment variables override the file for deployment and tests.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::models::FallbackPricePolicy;
use crate::prices::DEFAULT_PRICE_TTL_MINUTES;
use crate::sync::scheduler::{DEFAULT_MAX_CONCURRENT_SYNCS, DEFAULT_QUICK_PAGE_SIZE};
use crate::sync::SchedulerConfig;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shopcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Database file name inside the data directory
const DB_FILE: &str = "catalog.redb";

const ENV_CATALOG_URL: &str = "SHOPCACHE_CATALOG_URL";
const ENV_PRICING_URL: &str = "SHOPCACHE_PRICING_URL";
const ENV_API_TOKEN: &str = "SHOPCACHE_API_TOKEN";
const ENV_DATA_DIR: &str = "SHOPCACHE_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub catalog_url: String,
    pub pricing_url: String,
    /// Base URL product images are served from.
    pub media_url: Option<String>,
    pub api_token: Option<String>,
    /// Where the catalog database lives. Defaults to the user cache dir.
    pub data_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// Staleness threshold for the full catalog.
    pub catalog_ttl_hours: i64,
    /// Staleness threshold for a single category.
    pub category_ttl_minutes: i64,
    /// Lifetime of a live price entry.
    pub price_ttl_minutes: i64,
    pub auto_sync_interval_minutes: u64,
    pub max_concurrent_syncs: usize,
    pub quick_page_size: usize,
    pub fallback_price_policy: FallbackPricePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_url: "http://localhost:8080/api".to_string(),
            pricing_url: "http://localhost:8081/api".to_string(),
            media_url: None,
            api_token: None,
            data_dir: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            catalog_ttl_hours: 24,
            category_ttl_minutes: 60,
            price_ttl_minutes: DEFAULT_PRICE_TTL_MINUTES,
            auto_sync_interval_minutes: 15,
            max_concurrent_syncs: DEFAULT_MAX_CONCURRENT_SYNCS,
            quick_page_size: DEFAULT_QUICK_PAGE_SIZE,
            fallback_price_policy: FallbackPricePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config: Self = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(DB_FILE))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_CATALOG_URL) {
            self.catalog_url = url;
        }
        if let Some(url) = non_empty(ENV_PRICING_URL) {
            self.pricing_url = url;
        }
        if let Some(token) = non_empty(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    // ===== Derived durations =====

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn catalog_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.catalog_ttl_hours.max(0))
    }

    pub fn category_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.category_ttl_minutes.max(0))
    }

    pub fn price_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.price_ttl_minutes.max(0))
    }

    pub fn auto_sync_interval(&self) -> Duration {
        Duration::from_secs(self.auto_sync_interval_minutes.max(1) * 60)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent: self.max_concurrent_syncs.max(1),
            quick_page_size: self.quick_page_size.max(1),
            category_ttl: self.category_ttl(),
            auto_sync_interval: self.auto_sync_interval(),
        }
    }
}
