//! SQLite-backed catalog storage.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{parse_datetime, parse_datetime_opt, CatalogStorage, Result, StorageError};
use crate::models::{
    BrandRecord, OperationKind, OperationMetadata, OperationStatus, ProductRecord,
};

/// SQLite-backed store for brands, products, and operation metadata.
pub struct SqliteCatalogStore {
    db_path: PathBuf,
}

impl SqliteCatalogStore {
    /// Open (or create) a catalog database at the given path.
    pub fn new(db_path: &Path) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            -- Catalog brands, keyed by canonical slug
            CREATE TABLE IF NOT EXISTS brands (
                slug TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                source_url TEXT NOT NULL,
                description TEXT,
                country TEXT,
                captured_at TEXT NOT NULL
            );

            -- Products, unique per brand
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL,
                brand TEXT NOT NULL,
                name TEXT NOT NULL,
                source_url TEXT NOT NULL,
                description TEXT,
                flavors TEXT NOT NULL DEFAULT '[]',
                image_url TEXT,
                captured_at TEXT NOT NULL,

                UNIQUE(brand, slug)
            );

            -- One row per scrape run
            CREATE TABLE IF NOT EXISTS operations (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'in_progress',
                started_at TEXT NOT NULL,
                completed_at TEXT,
                brands_processed INTEGER NOT NULL DEFAULT 0,
                products_processed INTEGER NOT NULL DEFAULT 0,
                error_count INTEGER NOT NULL DEFAULT 0,
                error_details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_products_brand
                ON products(brand);
            CREATE INDEX IF NOT EXISTS idx_operations_started
                ON operations(started_at);
        "#,
        )?;
        Ok(())
    }

    fn row_to_operation(&self, row: &rusqlite::Row) -> rusqlite::Result<OperationMetadata> {
        let kind: String = row.get("kind")?;
        let status: String = row.get("status")?;
        let started_at: String = row.get("started_at")?;
        let completed_at: Option<String> = row.get("completed_at")?;

        Ok(OperationMetadata {
            id: row.get("id")?,
            kind: OperationKind::from_str(&kind).unwrap_or(OperationKind::FullScrape),
            status: OperationStatus::from_str(&status).unwrap_or(OperationStatus::Failed),
            started_at: parse_datetime(&started_at),
            completed_at: parse_datetime_opt(completed_at),
            brands_processed: row.get::<_, i64>("brands_processed")? as u64,
            products_processed: row.get::<_, i64>("products_processed")? as u64,
            error_count: row.get::<_, i64>("error_count")? as u64,
            error_details: row.get("error_details")?,
        })
    }
}

#[async_trait::async_trait]
impl CatalogStorage for SqliteCatalogStore {
    async fn upsert_brand(&self, record: &BrandRecord) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO brands (slug, name, source_url, description, country, captured_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(slug) DO UPDATE SET
                name = excluded.name,
                source_url = excluded.source_url,
                description = excluded.description,
                country = excluded.country,
                captured_at = excluded.captured_at
            "#,
            params![
                record.slug,
                record.name,
                record.source_url,
                record.description,
                record.country,
                record.captured_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn create_product(&self, record: &ProductRecord) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO products (
                slug, brand, name, source_url, description, flavors, image_url, captured_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.slug,
                record.brand,
                record.name,
                record.source_url,
                record.description,
                serde_json::to_string(&record.flavors)
                    .map_err(|e| StorageError::Other(e.to_string()))?,
                record.image_url,
                record.captured_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn create_operation(&self, operation: &OperationMetadata) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO operations (
                id, kind, status, started_at, completed_at,
                brands_processed, products_processed, error_count, error_details
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                operation.id,
                operation.kind.as_str(),
                operation.status.as_str(),
                operation.started_at.to_rfc3339(),
                operation.completed_at.map(|dt| dt.to_rfc3339()),
                operation.brands_processed as i64,
                operation.products_processed as i64,
                operation.error_count as i64,
                operation.error_details,
            ],
        )?;
        Ok(())
    }

    async fn update_operation(
        &self,
        id: &str,
        brands_processed: u64,
        products_processed: u64,
    ) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE operations SET brands_processed = ?1, products_processed = ?2 WHERE id = ?3",
            params![brands_processed as i64, products_processed as i64, id],
        )?;
        if changed == 0 {
            return Err(StorageError::UnknownOperation(id.to_string()));
        }
        Ok(())
    }

    async fn increment_error_count(&self, id: &str) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE operations SET error_count = error_count + 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(StorageError::UnknownOperation(id.to_string()));
        }
        Ok(())
    }

    async fn complete_operation(
        &self,
        id: &str,
        brands_processed: u64,
        products_processed: u64,
    ) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE operations SET
                status = 'completed',
                completed_at = ?1,
                brands_processed = ?2,
                products_processed = ?3
            WHERE id = ?4
            "#,
            params![
                chrono::Utc::now().to_rfc3339(),
                brands_processed as i64,
                products_processed as i64,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::UnknownOperation(id.to_string()));
        }
        Ok(())
    }

    async fn fail_operation(&self, id: &str, reason: &str) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE operations SET
                status = 'failed',
                completed_at = ?1,
                error_details = ?2
            WHERE id = ?3
            "#,
            params![chrono::Utc::now().to_rfc3339(), reason, id],
        )?;
        if changed == 0 {
            return Err(StorageError::UnknownOperation(id.to_string()));
        }
        Ok(())
    }

    async fn get_operation(&self, id: &str) -> Result<Option<OperationMetadata>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM operations WHERE id = ?")?;

        let operation = stmt.query_row(params![id], |row| self.row_to_operation(row));

        match operation {
            Ok(op) => Ok(Some(op)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn brand_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM brands", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn product_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn recent_operations(&self, limit: usize) -> Result<Vec<OperationMetadata>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM operations ORDER BY started_at DESC LIMIT ?")?;

        let operations = stmt
            .query_map(params![limit as i64], |row| self.row_to_operation(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::OperationKind;

    fn temp_store() -> (tempfile::TempDir, SqliteCatalogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalogStore::new(&dir.path().join("catalog.db")).unwrap();
        (dir, store)
    }

    fn brand(slug: &str, name: &str) -> BrandRecord {
        BrandRecord {
            slug: slug.to_string(),
            name: name.to_string(),
            source_url: format!("https://e.com/brands/{slug}"),
            description: None,
            country: Some("UAE".to_string()),
            captured_at: Utc::now(),
        }
    }

    fn product(brand: &str, slug: &str) -> ProductRecord {
        ProductRecord {
            slug: slug.to_string(),
            brand: brand.to_string(),
            name: slug.to_string(),
            source_url: format!("https://e.com/brands/{brand}/products/{slug}"),
            description: None,
            flavors: vec!["apple".to_string(), "anise".to_string()],
            image_url: None,
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_brand_replaces_fields() {
        let (_dir, store) = temp_store();
        store.upsert_brand(&brand("al-fakher", "Al Fakher")).await.unwrap();
        store
            .upsert_brand(&brand("al-fakher", "Al Fakher Tobacco"))
            .await
            .unwrap();
        assert_eq!(store.brand_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_product_insert_errors() {
        let (_dir, store) = temp_store();
        store.create_product(&product("al-fakher", "double-apple")).await.unwrap();
        assert!(store
            .create_product(&product("al-fakher", "double-apple"))
            .await
            .is_err());
        // Same slug under another brand is fine.
        store.create_product(&product("adalya", "double-apple")).await.unwrap();
        assert_eq!(store.product_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_operation_round_trip() {
        let (_dir, store) = temp_store();
        let op = OperationMetadata::begin(OperationKind::BrandScrape);
        store.create_operation(&op).await.unwrap();
        store.increment_error_count(&op.id).await.unwrap();
        store.increment_error_count(&op.id).await.unwrap();
        store.complete_operation(&op.id, 5, 0).await.unwrap();

        let stored = store.get_operation(&op.id).await.unwrap().unwrap();
        assert_eq!(stored.kind, OperationKind::BrandScrape);
        assert_eq!(stored.status, crate::models::OperationStatus::Completed);
        assert_eq!(stored.error_count, 2);
        assert_eq!(stored.brands_processed, 5);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_transitions_on_unknown_id_error() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.complete_operation("missing", 0, 0).await,
            Err(StorageError::UnknownOperation(_))
        ));
        assert!(matches!(
            store.fail_operation("missing", "whoops").await,
            Err(StorageError::UnknownOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_recent_operations_newest_first() {
        let (_dir, store) = temp_store();
        let mut first = OperationMetadata::begin(OperationKind::BrandScrape);
        first.started_at = Utc::now() - chrono::Duration::minutes(10);
        let second = OperationMetadata::begin(OperationKind::ProductScrape);
        store.create_operation(&first).await.unwrap();
        store.create_operation(&second).await.unwrap();

        let recent = store.recent_operations(5).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second.id);
    }
}
