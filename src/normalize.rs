//! Record normalization and validation.
//!
//! Normalization turns raw parser output into persistable records: a
//! canonical slug, collapsed whitespace, and a capture timestamp.
//! Validation enforces length, slug shape, URL shape, and timestamp
//! sanity before anything reaches storage.

use std::sync::OnceLock;

use chrono::{Duration, Utc};
use regex::Regex;
use url::Url;

use crate::models::{BrandDetail, BrandRecord, ProductDetail, ProductRecord};

/// Maximum accepted name length.
const MAX_NAME_LEN: usize = 200;

/// Maximum accepted slug length.
const MAX_SLUG_LEN: usize = 120;

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug pattern"))
}

/// Build a canonical slug from a display name: case-folded, with runs
/// of non-alphanumeric characters collapsed to single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Identifier for a listing entry: the last path segment of its detail
/// URL when one exists, otherwise a slug built from its name.
pub fn listing_identifier(name: &str, source_url: &str) -> String {
    let from_url = Url::parse(source_url).ok().and_then(|url| {
        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(|segment| segment.to_lowercase())
    });

    match from_url {
        Some(segment) if !segment.is_empty() => segment,
        _ => slugify(name),
    }
}

/// Collapse interior whitespace runs and trim.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_opt(text: Option<String>) -> Option<String> {
    text.map(|t| clean_text(&t)).filter(|t| !t.is_empty())
}

/// Normalize a raw brand detail into a persistable record.
pub fn normalize_brand(detail: BrandDetail) -> BrandRecord {
    let name = clean_text(&detail.name);
    BrandRecord {
        slug: slugify(&name),
        name,
        source_url: detail.source_url.trim().to_string(),
        description: clean_opt(detail.description),
        country: clean_opt(detail.country),
        captured_at: Utc::now(),
    }
}

/// Normalize a raw product detail into a persistable record.
pub fn normalize_product(detail: ProductDetail) -> ProductRecord {
    let name = clean_text(&detail.name);
    ProductRecord {
        slug: slugify(&name),
        brand: detail.brand.trim().to_lowercase(),
        name,
        source_url: detail.source_url.trim().to_string(),
        description: clean_opt(detail.description),
        flavors: detail
            .flavors
            .iter()
            .map(|f| clean_text(f))
            .filter(|f| !f.is_empty())
            .collect(),
        image_url: clean_opt(detail.image_url),
        captured_at: Utc::now(),
    }
}

/// Result of validating a normalized record.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a normalized brand record.
pub fn validate_brand(record: &BrandRecord) -> ValidationReport {
    let mut errors = Vec::new();
    check_name(&record.name, &mut errors);
    check_slug(&record.slug, "slug", &mut errors);
    check_url(&record.source_url, &mut errors);
    check_timestamp(record.captured_at, &mut errors);
    ValidationReport::from_errors(errors)
}

/// Validate a normalized product record.
pub fn validate_product(record: &ProductRecord) -> ValidationReport {
    let mut errors = Vec::new();
    check_name(&record.name, &mut errors);
    check_slug(&record.slug, "slug", &mut errors);
    check_slug(&record.brand, "brand", &mut errors);
    check_url(&record.source_url, &mut errors);
    check_timestamp(record.captured_at, &mut errors);
    ValidationReport::from_errors(errors)
}

fn check_name(name: &str, errors: &mut Vec<String>) {
    if name.is_empty() {
        errors.push("name is empty".to_string());
    } else if name.len() > MAX_NAME_LEN {
        errors.push(format!("name exceeds {MAX_NAME_LEN} characters"));
    }
}

fn check_slug(slug: &str, field: &str, errors: &mut Vec<String>) {
    if slug.is_empty() {
        errors.push(format!("{field} is empty"));
    } else if slug.len() > MAX_SLUG_LEN {
        errors.push(format!("{field} exceeds {MAX_SLUG_LEN} characters"));
    } else if !slug_pattern().is_match(slug) {
        errors.push(format!("{field} '{slug}' is not a valid slug"));
    }
}

fn check_url(raw: &str, errors: &mut Vec<String>) {
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!("source URL has unsupported scheme '{}'", url.scheme())),
        Err(_) => errors.push(format!("source URL '{raw}' is not a valid URL")),
    }
}

fn check_timestamp(captured_at: chrono::DateTime<Utc>, errors: &mut Vec<String>) {
    // Small allowance for clock skew.
    if captured_at > Utc::now() + Duration::minutes(5) {
        errors.push("capture timestamp is in the future".to_string());
    }
}
