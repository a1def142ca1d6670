//! Storage layer for catalog records and operation metadata.

mod memory;
mod sqlite;

pub use memory::MemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{BrandRecord, OperationMetadata, ProductRecord};

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no such operation: {0}")]
    UnknownOperation(String),

    #[error("storage failure: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Persistence operations the scrape engine depends on.
///
/// Every method may fail; the engine catches failures at the pipeline
/// and lifecycle boundaries rather than letting them abort a run.
#[async_trait]
pub trait CatalogStorage: Send + Sync {
    /// Insert or update a brand, keyed by slug.
    async fn upsert_brand(&self, record: &BrandRecord) -> Result<()>;

    /// Insert a product. Duplicate (brand, slug) pairs are an error;
    /// the engine's duplicate index keeps them away in normal runs.
    async fn create_product(&self, record: &ProductRecord) -> Result<()>;

    /// Record a newly started operation.
    async fn create_operation(&self, operation: &OperationMetadata) -> Result<()>;

    /// Update an in-flight operation's progress counters.
    async fn update_operation(
        &self,
        id: &str,
        brands_processed: u64,
        products_processed: u64,
    ) -> Result<()>;

    /// Bump an operation's error counter by one.
    async fn increment_error_count(&self, id: &str) -> Result<()>;

    /// Mark an operation completed with final counters.
    async fn complete_operation(
        &self,
        id: &str,
        brands_processed: u64,
        products_processed: u64,
    ) -> Result<()>;

    /// Mark an operation failed with a reason.
    async fn fail_operation(&self, id: &str, reason: &str) -> Result<()>;

    /// Look up one operation.
    async fn get_operation(&self, id: &str) -> Result<Option<OperationMetadata>>;

    /// Stored brand count.
    async fn brand_count(&self) -> Result<u64>;

    /// Stored product count.
    async fn product_count(&self) -> Result<u64>;

    /// Most recently started operations, newest first.
    async fn recent_operations(&self, limit: usize) -> Result<Vec<OperationMetadata>>;
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
