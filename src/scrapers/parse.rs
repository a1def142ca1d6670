//! Catalog page parsing.
//!
//! The orchestration engine only sees the [`CatalogParser`] trait:
//! list pages become listing records plus pagination info, detail pages
//! become raw brand/product records, and the completion predicate
//! decides when a paginated walk has seen everything. The production
//! implementation reads the site's HTML through configured CSS
//! selectors.

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::config::SelectorConfig;
use crate::models::{BrandDetail, ListingRecord, ProductDetail};

/// What a discovery walk enumerates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryScope {
    /// All brands on the site.
    Brands,
    /// The products of one brand.
    Products { brand: String },
}

impl DiscoveryScope {
    /// Short tag for logging and page info.
    pub fn label(&self) -> String {
        match self {
            Self::Brands => "brands".to_string(),
            Self::Products { brand } => format!("products:{brand}"),
        }
    }
}

/// Pagination facts for one list page.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// Scope tag the page belongs to.
    pub scope: String,
    /// Offset this page was requested at.
    pub offset: u64,
    /// Entries found on this page.
    pub count_on_page: usize,
    /// Site-reported total for the scope, when the page carries one.
    pub total_count: Option<u64>,
    /// Whether the page points at a successor.
    pub has_more: bool,
}

/// Parsed contents of one list page.
#[derive(Debug, Clone)]
pub struct ParsedListPage {
    pub records: Vec<ListingRecord>,
    pub page_info: PageInfo,
}

/// Turns page bodies into records and drives the completion decision.
pub trait CatalogParser: Send + Sync {
    /// Parse a list page. An empty record list means end of data.
    fn parse_list_page(&self, body: &str, scope: &DiscoveryScope, offset: u64) -> ParsedListPage;

    /// Parse a brand detail page. None when the page has no usable record.
    fn parse_brand_page(&self, body: &str, slug: &str, url: &str) -> Option<BrandDetail>;

    /// Parse a product detail page.
    fn parse_product_page(
        &self,
        body: &str,
        slug: &str,
        brand: &str,
        url: &str,
    ) -> Option<ProductDetail>;

    /// Whether a paginated walk has accumulated everything the scope
    /// holds. Consulted after every page; the walk continues only while
    /// the page reports more data and this returns false.
    fn is_discovery_complete(&self, page_info: &PageInfo, accumulated: usize) -> bool;
}

/// Selector-driven HTML parser for the catalog site.
pub struct HtmlCatalogParser {
    base_url: String,
    selectors: SelectorConfig,
}

impl HtmlCatalogParser {
    pub fn new(base_url: String, selectors: SelectorConfig) -> Self {
        Self { base_url, selectors }
    }

    fn select_text(&self, document: &Html, selector_str: &str) -> Option<String> {
        let selector = match Selector::parse(selector_str) {
            Ok(s) => s,
            Err(_) => {
                warn!("failed to parse selector: {}", selector_str);
                return None;
            }
        };
        document
            .select(&selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    }

    fn resolve_href(&self, href: &str) -> Option<String> {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .ok()
    }
}

impl CatalogParser for HtmlCatalogParser {
    fn parse_list_page(&self, body: &str, scope: &DiscoveryScope, offset: u64) -> ParsedListPage {
        let document = Html::parse_document(body);
        let mut records = Vec::new();

        if let Ok(item_selector) = Selector::parse(&self.selectors.list_item) {
            let name_selector = Selector::parse(&self.selectors.item_name).ok();
            let link_selector = Selector::parse(&self.selectors.item_link).ok();

            for item in document.select(&item_selector) {
                let name = name_selector
                    .as_ref()
                    .and_then(|s| item.select(s).next())
                    .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                    .filter(|s| !s.is_empty());

                let source_url = link_selector
                    .as_ref()
                    .and_then(|s| item.select(s).next())
                    .and_then(|el| el.value().attr("href"))
                    .and_then(|href| self.resolve_href(href));

                match (name, source_url) {
                    (Some(name), Some(source_url)) => {
                        records.push(ListingRecord { name, source_url })
                    }
                    _ => debug!("skipping listing entry without name or link"),
                }
            }
        } else {
            warn!("failed to parse selector: {}", self.selectors.list_item);
        }

        let total_count = self
            .select_text(&document, &self.selectors.total_count)
            .and_then(|text| last_integer(&text));

        let next_present = Selector::parse(&self.selectors.next_page)
            .map(|s| document.select(&s).next().is_some())
            .unwrap_or(false);

        // A next link is authoritative; otherwise fall back to count math.
        let has_more = next_present
            || total_count
                .map(|total| offset + (records.len() as u64) < total)
                .unwrap_or(false);

        ParsedListPage {
            page_info: PageInfo {
                scope: scope.label(),
                offset,
                count_on_page: records.len(),
                total_count,
                has_more,
            },
            records,
        }
    }

    fn parse_brand_page(&self, body: &str, slug: &str, url: &str) -> Option<BrandDetail> {
        let document = Html::parse_document(body);

        let name = self.select_text(&document, &self.selectors.detail_name)?;
        let description = self.select_text(&document, &self.selectors.detail_description);
        let country = self.select_text(&document, &self.selectors.detail_country);

        debug!("parsed brand page for {}", slug);
        Some(BrandDetail {
            name,
            source_url: url.to_string(),
            description,
            country,
        })
    }

    fn parse_product_page(
        &self,
        body: &str,
        slug: &str,
        brand: &str,
        url: &str,
    ) -> Option<ProductDetail> {
        let document = Html::parse_document(body);

        let name = self.select_text(&document, &self.selectors.detail_name)?;
        let description = self.select_text(&document, &self.selectors.detail_description);

        let flavors = Selector::parse(&self.selectors.detail_flavor)
            .map(|selector| {
                document
                    .select(&selector)
                    .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let image_url = Selector::parse(&self.selectors.detail_image)
            .ok()
            .and_then(|selector| {
                document
                    .select(&selector)
                    .next()
                    .and_then(|el| el.value().attr("src"))
                    .and_then(|src| self.resolve_href(src))
            });

        debug!("parsed product page for {}/{}", brand, slug);
        Some(ProductDetail {
            name,
            brand: brand.to_string(),
            source_url: url.to_string(),
            description,
            flavors,
            image_url,
        })
    }

    fn is_discovery_complete(&self, page_info: &PageInfo, accumulated: usize) -> bool {
        // Totals can drift between pages while the site recounts; the
        // latest page's figure wins. Without a total we cannot call the
        // walk complete and rely on has_more alone.
        match page_info.total_count {
            Some(total) => accumulated as u64 >= total,
            None => false,
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last run of digits in the text, if any. Count banners put the total
/// at the end ("Showing 1-20 of 57").
fn last_integer(text: &str) -> Option<u64> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|chunk| !chunk.is_empty())
        .next_back()
        .and_then(|chunk| chunk.parse().ok())
}
