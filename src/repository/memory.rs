//! In-memory storage for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CatalogStorage, Result, StorageError};
use crate::models::{BrandRecord, OperationMetadata, ProductRecord};

#[derive(Debug, Default)]
struct MemoryState {
    brands: HashMap<String, BrandRecord>,
    products: Vec<ProductRecord>,
    /// Operations in creation order.
    operations: Vec<OperationMetadata>,
}

/// Storage backed by process memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    state: Mutex<MemoryState>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored brands, for assertions.
    pub fn brands(&self) -> Vec<BrandRecord> {
        let state = self.state.lock().expect("store lock poisoned");
        let mut brands: Vec<_> = state.brands.values().cloned().collect();
        brands.sort_by(|a, b| a.slug.cmp(&b.slug));
        brands
    }

    /// Snapshot of stored products, for assertions.
    pub fn products(&self) -> Vec<ProductRecord> {
        self.state.lock().expect("store lock poisoned").products.clone()
    }

    /// Snapshot of stored operations, for assertions.
    pub fn operations(&self) -> Vec<OperationMetadata> {
        self.state
            .lock()
            .expect("store lock poisoned")
            .operations
            .clone()
    }
}

#[async_trait]
impl CatalogStorage for MemoryCatalogStore {
    async fn upsert_brand(&self, record: &BrandRecord) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.brands.insert(record.slug.clone(), record.clone());
        Ok(())
    }

    async fn create_product(&self, record: &ProductRecord) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let exists = state
            .products
            .iter()
            .any(|p| p.brand == record.brand && p.slug == record.slug);
        if exists {
            return Err(StorageError::Other(format!(
                "product {}/{} already exists",
                record.brand, record.slug
            )));
        }
        state.products.push(record.clone());
        Ok(())
    }

    async fn create_operation(&self, operation: &OperationMetadata) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.operations.push(operation.clone());
        Ok(())
    }

    async fn update_operation(
        &self,
        id: &str,
        brands_processed: u64,
        products_processed: u64,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let operation = state
            .operations
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| StorageError::UnknownOperation(id.to_string()))?;
        operation.brands_processed = brands_processed;
        operation.products_processed = products_processed;
        Ok(())
    }

    async fn increment_error_count(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let operation = state
            .operations
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| StorageError::UnknownOperation(id.to_string()))?;
        operation.error_count += 1;
        Ok(())
    }

    async fn complete_operation(
        &self,
        id: &str,
        brands_processed: u64,
        products_processed: u64,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let operation = state
            .operations
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| StorageError::UnknownOperation(id.to_string()))?;
        operation.complete(brands_processed, products_processed);
        Ok(())
    }

    async fn fail_operation(&self, id: &str, reason: &str) -> Result<()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let operation = state
            .operations
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| StorageError::UnknownOperation(id.to_string()))?;
        operation.fail(reason);
        Ok(())
    }

    async fn get_operation(&self, id: &str) -> Result<Option<OperationMetadata>> {
        let state = self.state.lock().expect("store lock poisoned");
        Ok(state.operations.iter().find(|op| op.id == id).cloned())
    }

    async fn brand_count(&self) -> Result<u64> {
        Ok(self.state.lock().expect("store lock poisoned").brands.len() as u64)
    }

    async fn product_count(&self) -> Result<u64> {
        Ok(self.state.lock().expect("store lock poisoned").products.len() as u64)
    }

    async fn recent_operations(&self, limit: usize) -> Result<Vec<OperationMetadata>> {
        let state = self.state.lock().expect("store lock poisoned");
        Ok(state.operations.iter().rev().take(limit).cloned().collect())
    }
}
