//! Duplicate detection over case-folded identifiers.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct IndexState {
    brands: HashSet<String>,
    /// Product keys per brand; product slugs only need to be unique
    /// within their brand.
    products: HashMap<String, HashSet<String>>,
    total: u64,
}

/// Membership index shared by discovery and extraction.
///
/// Identifiers are case-folded before any membership test. The total
/// counts successful insertions and only `reset` brings it back down.
/// Guarded for insertion from concurrent batch members.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    state: Mutex<IndexState>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn fold(identifier: &str) -> String {
        identifier.trim().to_lowercase()
    }

    /// Record a brand identifier. Returns true when it was already known.
    pub fn add_brand(&self, identifier: &str) -> bool {
        let key = Self::fold(identifier);
        let mut state = self.state.lock().expect("index lock poisoned");
        if state.brands.insert(key) {
            state.total += 1;
            false
        } else {
            true
        }
    }

    /// Record a product identifier under a brand. Returns true when it
    /// was already known for that brand.
    pub fn add_product(&self, brand: &str, identifier: &str) -> bool {
        let brand_key = Self::fold(brand);
        let key = Self::fold(identifier);
        let mut state = self.state.lock().expect("index lock poisoned");
        if state.products.entry(brand_key).or_default().insert(key) {
            state.total += 1;
            false
        } else {
            true
        }
    }

    /// Distinct brand identifiers recorded.
    pub fn brand_count(&self) -> usize {
        self.state.lock().expect("index lock poisoned").brands.len()
    }

    /// Distinct product identifiers recorded, summed across brands.
    pub fn product_count(&self) -> usize {
        self.state
            .lock()
            .expect("index lock poisoned")
            .products
            .values()
            .map(|set| set.len())
            .sum()
    }

    /// Successful insertions since the last reset.
    pub fn total_count(&self) -> u64 {
        self.state.lock().expect("index lock poisoned").total
    }

    /// Forget everything.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("index lock poisoned");
        *state = IndexState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_folded_brand_dedup() {
        let index = DuplicateIndex::new();
        assert!(!index.add_brand("Al-Fakher"));
        assert!(index.add_brand("al-fakher"));
        assert!(index.add_brand(" AL-FAKHER "));
        assert_eq!(index.brand_count(), 1);
        assert_eq!(index.total_count(), 1);
    }

    #[test]
    fn test_products_scoped_per_brand() {
        let index = DuplicateIndex::new();
        assert!(!index.add_product("al-fakher", "Double Apple"));
        assert!(index.add_product("al-fakher", "double apple"));
        // Same product name under another brand is a distinct key.
        assert!(!index.add_product("adalya", "Double Apple"));
        assert_eq!(index.product_count(), 2);
    }

    #[test]
    fn test_total_counts_all_insertions() {
        let index = DuplicateIndex::new();
        index.add_brand("a");
        index.add_brand("b");
        index.add_product("a", "x");
        index.add_product("a", "x");
        assert_eq!(index.total_count(), 3);
    }

    #[test]
    fn test_reset_forgets_everything() {
        let index = DuplicateIndex::new();
        index.add_brand("a");
        index.add_product("a", "x");
        index.reset();
        assert_eq!(index.brand_count(), 0);
        assert_eq!(index.product_count(), 0);
        assert_eq!(index.total_count(), 0);
        assert!(!index.add_brand("a"));
    }

    #[test]
    fn test_concurrent_insertions_count_once() {
        use std::sync::Arc;

        let index = Arc::new(DuplicateIndex::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let index = index.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    index.add_brand(&format!("brand-{i}"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(index.brand_count(), 100);
        assert_eq!(index.total_count(), 100);
    }
}
