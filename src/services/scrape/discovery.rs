//! Paginated discovery walks.

use tracing::{debug, info, warn};

use super::types::DiscoveryOutcome;
use super::ScrapeService;
use crate::normalize::listing_identifier;
use crate::scrapers::{DiscoveryScope, FetchError};

impl ScrapeService {
    /// Enumerate all brand identifiers on the site.
    pub async fn discover_brands(&self) -> Result<DiscoveryOutcome, FetchError> {
        self.discover(DiscoveryScope::Brands).await
    }

    /// Enumerate the product identifiers of one brand.
    pub async fn discover_products(&self, brand: &str) -> Result<DiscoveryOutcome, FetchError> {
        self.discover(DiscoveryScope::Products {
            brand: brand.to_string(),
        })
        .await
    }

    /// Walk list pages for a scope until the site runs out of data, the
    /// completion predicate is satisfied, or the iteration cap trips.
    ///
    /// Fetch errors propagate: without a list page nothing downstream
    /// can proceed, so the caller decides whether to retry the walk.
    async fn discover(&self, scope: DiscoveryScope) -> Result<DiscoveryOutcome, FetchError> {
        let checkpoint_interval = self.settings.scrape.checkpoint_interval.max(1);
        let iteration_cap = self.settings.scrape.max_discovery_iterations;

        let mut identifiers: Vec<String> = Vec::new();
        let mut iterations = 0u32;
        let mut offset = 0u64;
        let mut has_more = false;

        info!("starting discovery for {}", scope.label());

        loop {
            if iterations >= iteration_cap {
                warn!(
                    "discovery for {} stopped at the {} iteration cap",
                    scope.label(),
                    iteration_cap
                );
                break;
            }

            let url = self.settings.list_url(&scope, offset);
            let page = self.fetcher.fetch(&url).await?;

            let Some(body) = page.body_text() else {
                warn!(
                    "list page fetch for {} failed at offset {} (HTTP {:?}); stopping",
                    scope.label(),
                    offset,
                    page.status_code
                );
                has_more = false;
                break;
            };

            let parsed = self.parser.parse_list_page(body, &scope, offset);
            iterations += 1;

            if parsed.records.is_empty() {
                debug!(
                    "no records for {} at offset {}; treating as end of data",
                    scope.label(),
                    offset
                );
                has_more = false;
                break;
            }

            let mut fresh = 0u64;
            for record in &parsed.records {
                let identifier = listing_identifier(&record.name, &record.source_url);
                let was_duplicate = match &scope {
                    DiscoveryScope::Brands => self.index.add_brand(&identifier),
                    DiscoveryScope::Products { brand } => {
                        self.index.add_product(brand, &identifier)
                    }
                };
                if was_duplicate {
                    debug!("already saw {}, skipping", identifier);
                    continue;
                }
                fresh += 1;
                identifiers.push(identifier);
            }
            match &scope {
                DiscoveryScope::Brands => self.add_brands_discovered(fresh),
                DiscoveryScope::Products { .. } => self.add_products_discovered(fresh),
            }

            info!(
                "{} page at offset {}: {} entries, {} new (total {})",
                scope.label(),
                offset,
                parsed.page_info.count_on_page,
                fresh,
                identifiers.len()
            );

            if iterations % checkpoint_interval == 0 {
                self.emit_checkpoint(iterations);
            }

            has_more = parsed.page_info.has_more;
            let complete = self
                .parser
                .is_discovery_complete(&parsed.page_info, identifiers.len());
            if !has_more || complete {
                break;
            }

            offset += parsed.page_info.count_on_page as u64;
        }

        info!(
            "discovery for {} done: {} identifiers over {} iterations",
            scope.label(),
            identifiers.len(),
            iterations
        );

        Ok(DiscoveryOutcome {
            total_discovered: identifiers.len(),
            identifiers,
            iterations,
            has_more,
        })
    }
}
