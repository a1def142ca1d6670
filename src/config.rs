//! Configuration for the catalog scraper.
//!
//! Settings load from an optional TOML file with serde field defaults,
//! so an empty file (or none at all) yields a working configuration for
//! the default catalog site. `SHISHA_BASE_URL` and `SHISHA_DATABASE`
//! override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scrapers::DiscoveryScope;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Settings {
    /// Load settings from a TOML file, or defaults when `path` is None.
    /// Environment overrides are applied after the file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        if let Ok(base_url) = std::env::var("SHISHA_BASE_URL") {
            settings.site.base_url = base_url;
        }
        if let Ok(database) = std::env::var("SHISHA_DATABASE") {
            settings.storage.database_path = PathBuf::from(database);
        }

        Ok(settings)
    }

    /// Build the list-page URL for a discovery scope at an offset.
    pub fn list_url(&self, scope: &DiscoveryScope, offset: u64) -> String {
        let path = match scope {
            DiscoveryScope::Brands => self
                .site
                .brand_list_path
                .replace("{offset}", &offset.to_string()),
            DiscoveryScope::Products { brand } => self
                .site
                .product_list_path
                .replace("{brand}", brand)
                .replace("{offset}", &offset.to_string()),
        };
        format!("{}{}", self.site.base_url, path)
    }

    /// Build the detail-page URL for a brand slug.
    pub fn brand_page_url(&self, slug: &str) -> String {
        let path = self.site.brand_page_path.replace("{slug}", slug);
        format!("{}{}", self.site.base_url, path)
    }

    /// Build the detail-page URL for a product slug under a brand.
    pub fn product_page_url(&self, brand: &str, slug: &str) -> String {
        let path = self
            .site
            .product_page_path
            .replace("{brand}", brand)
            .replace("{slug}", slug);
        format!("{}{}", self.site.base_url, path)
    }
}

/// Site layout: base URL plus path templates.
///
/// List templates take an `{offset}` placeholder; detail templates take
/// `{slug}` and, for products, `{brand}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_brand_list_path")]
    pub brand_list_path: String,
    #[serde(default = "default_product_list_path")]
    pub product_list_path: String,
    #[serde(default = "default_brand_page_path")]
    pub brand_page_path: String,
    #[serde(default = "default_product_page_path")]
    pub product_page_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            brand_list_path: default_brand_list_path(),
            product_list_path: default_product_list_path(),
            brand_page_path: default_brand_page_path(),
            product_page_path: default_product_page_path(),
        }
    }
}

/// Pacing, retry, and concurrency knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Minimum delay between any two requests, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds; doubles per retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Brand detail pages fetched simultaneously per batch.
    #[serde(default = "default_max_concurrent_brands")]
    pub max_concurrent_brands: usize,
    /// Product detail pages fetched simultaneously per batch.
    #[serde(default = "default_max_concurrent_products")]
    pub max_concurrent_products: usize,
    /// Emit a checkpoint every this many discovery iterations.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,
    /// Hard cap on list pages walked per discovery call.
    #[serde(default = "default_max_discovery_iterations")]
    pub max_discovery_iterations: u32,
    /// Custom user agent; None uses the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_concurrent_brands: default_max_concurrent_brands(),
            max_concurrent_products: default_max_concurrent_products(),
            checkpoint_interval: default_checkpoint_interval(),
            max_discovery_iterations: default_max_discovery_iterations(),
            user_agent: None,
        }
    }
}

/// CSS selectors driving the HTML parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// One element per listing entry.
    #[serde(default = "default_list_item")]
    pub list_item: String,
    /// Name text within a listing entry.
    #[serde(default = "default_item_name")]
    pub item_name: String,
    /// Detail link within a listing entry.
    #[serde(default = "default_item_link")]
    pub item_link: String,
    /// Element whose text carries the total result count.
    #[serde(default = "default_total_count")]
    pub total_count: String,
    /// Present when another page follows.
    #[serde(default = "default_next_page")]
    pub next_page: String,
    /// Name heading on a detail page.
    #[serde(default = "default_detail_name")]
    pub detail_name: String,
    #[serde(default = "default_detail_description")]
    pub detail_description: String,
    #[serde(default = "default_detail_country")]
    pub detail_country: String,
    /// One element per flavor note on a product page.
    #[serde(default = "default_detail_flavor")]
    pub detail_flavor: String,
    #[serde(default = "default_detail_image")]
    pub detail_image: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            list_item: default_list_item(),
            item_name: default_item_name(),
            item_link: default_item_link(),
            total_count: default_total_count(),
            next_page: default_next_page(),
            detail_name: default_detail_name(),
            detail_description: default_detail_description(),
            detail_country: default_detail_country(),
            detail_flavor: default_detail_flavor(),
            detail_image: default_detail_image(),
        }
    }
}

/// Where catalog data lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_base_url() -> String {
    "https://shishadb.example.com".to_string()
}

fn default_brand_list_path() -> String {
    "/brands?offset={offset}".to_string()
}

fn default_product_list_path() -> String {
    "/brands/{brand}/products?offset={offset}".to_string()
}

fn default_brand_page_path() -> String {
    "/brands/{slug}".to_string()
}

fn default_product_page_path() -> String {
    "/brands/{brand}/products/{slug}".to_string()
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_max_concurrent_brands() -> usize {
    3
}

fn default_max_concurrent_products() -> usize {
    5
}

fn default_checkpoint_interval() -> u32 {
    10
}

fn default_max_discovery_iterations() -> u32 {
    500
}

fn default_list_item() -> String {
    ".catalog-list .catalog-item".to_string()
}

fn default_item_name() -> String {
    ".item-name".to_string()
}

fn default_item_link() -> String {
    "a".to_string()
}

fn default_total_count() -> String {
    ".result-count".to_string()
}

fn default_next_page() -> String {
    ".pagination a[rel='next']".to_string()
}

fn default_detail_name() -> String {
    "h1".to_string()
}

fn default_detail_description() -> String {
    ".description".to_string()
}

fn default_detail_country() -> String {
    ".country".to_string()
}

fn default_detail_flavor() -> String {
    ".flavors li".to_string()
}

fn default_detail_image() -> String {
    ".product-image img".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("shishacquire.db")
}
