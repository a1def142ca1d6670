//! Catalog record models for brands and their products.
//!
//! Raw detail records come straight out of the page parser; normalized
//! records carry a canonical slug and capture timestamp and are what the
//! storage layer persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry found on a paginated list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    /// Display name as it appears in the listing.
    pub name: String,
    /// Absolute URL of the entry's detail page.
    pub source_url: String,
}

/// Raw brand data extracted from a brand detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandDetail {
    pub name: String,
    pub source_url: String,
    pub description: Option<String>,
    pub country: Option<String>,
}

/// Raw product data extracted from a product detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetail {
    pub name: String,
    /// Slug of the brand this product belongs to.
    pub brand: String,
    pub source_url: String,
    pub description: Option<String>,
    /// Flavor notes listed on the page, in page order.
    pub flavors: Vec<String>,
    pub image_url: Option<String>,
}

/// A normalized brand record ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandRecord {
    /// Canonical slug, unique across brands.
    pub slug: String,
    pub name: String,
    pub source_url: String,
    pub description: Option<String>,
    pub country: Option<String>,
    /// When this record was captured from the site.
    pub captured_at: DateTime<Utc>,
}

/// A normalized product record ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Canonical slug, unique within its brand.
    pub slug: String,
    pub brand: String,
    pub name: String,
    pub source_url: String,
    pub description: Option<String>,
    pub flavors: Vec<String>,
    pub image_url: Option<String>,
    pub captured_at: DateTime<Utc>,
}
