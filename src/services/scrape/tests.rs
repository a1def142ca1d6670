//! Service-level tests with scripted collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::checkpoint::testing::CollectingSink;
use super::*;
use crate::config::Settings;
use crate::models::{BrandDetail, ListingRecord, OperationKind, ProductDetail};
use crate::repository::{CatalogStorage, MemoryCatalogStore, StorageError};
use crate::scrapers::{
    CatalogParser, DiscoveryScope, PageFetcher, PageInfo, PageTransport, ParsedListPage,
    TransportError, TransportResponse,
};

/// Transport that serves a fixed URL -> response map; unknown URLs 404.
#[derive(Default)]
struct MapTransport {
    pages: HashMap<String, String>,
    /// URLs that fail with a transport fault instead of responding.
    faults: Vec<String>,
}

impl MapTransport {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    fn fault(mut self, url: &str) -> Self {
        self.faults.push(url.to_string());
        self
    }
}

#[async_trait]
impl PageTransport for MapTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        if self.faults.iter().any(|f| f == url) {
            return Err(TransportError::Fault("scripted fault".into()));
        }
        match self.pages.get(url) {
            Some(body) => Ok(TransportResponse {
                status: 200,
                body: body.clone(),
            }),
            None => Ok(TransportResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

/// Parser driven by body text written as a tiny line format:
///
/// ```text
/// item <name> <url>
/// total <n>
/// more
/// ```
///
/// Detail bodies are `brand <name>` / `product <name>`; anything else
/// parses to nothing.
struct LineParser;

impl CatalogParser for LineParser {
    fn parse_list_page(&self, body: &str, scope: &DiscoveryScope, offset: u64) -> ParsedListPage {
        let mut records = Vec::new();
        let mut total_count = None;
        let mut has_more = false;

        for line in body.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("item ") {
                if let Some((name, url)) = rest.rsplit_once(' ') {
                    records.push(ListingRecord {
                        name: name.to_string(),
                        source_url: url.to_string(),
                    });
                }
            } else if let Some(total) = line.strip_prefix("total ") {
                total_count = total.parse().ok();
            } else if line == "more" {
                has_more = true;
            }
        }

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

    fn parse_brand_page(&self, body: &str, _slug: &str, url: &str) -> Option<BrandDetail> {
        let name = body.trim().strip_prefix("brand ")?;
        Some(BrandDetail {
            name: name.to_string(),
            source_url: url.to_string(),
            description: None,
            country: None,
        })
    }

    fn parse_product_page(
        &self,
        body: &str,
        _slug: &str,
        brand: &str,
        url: &str,
    ) -> Option<ProductDetail> {
        let name = body.trim().strip_prefix("product ")?;
        Some(ProductDetail {
            name: name.to_string(),
            brand: brand.to_string(),
            source_url: url.to_string(),
            description: None,
            flavors: vec![],
            image_url: None,
        })
    }

    fn is_discovery_complete(&self, page_info: &PageInfo, accumulated: usize) -> bool {
        match page_info.total_count {
            Some(total) => accumulated as u64 >= total,
            None => false,
        }
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.scrape.request_delay_ms = 0;
    settings.scrape.max_retries = 0;
    settings.scrape.retry_base_delay_ms = 1;
    settings
}

fn service(transport: MapTransport, storage: Arc<dyn CatalogStorage>) -> ScrapeService {
    service_with_sink(transport, storage, Arc::new(LogCheckpointSink))
}

fn service_with_sink(
    transport: MapTransport,
    storage: Arc<dyn CatalogStorage>,
    sink: Arc<dyn CheckpointSink>,
) -> ScrapeService {
    let settings = settings();
    let fetcher = PageFetcher::new(
        Arc::new(transport),
        Duration::ZERO,
        settings.scrape.max_retries,
        Duration::from_millis(settings.scrape.retry_base_delay_ms),
    );
    ScrapeService::with_collaborators(settings, fetcher, Arc::new(LineParser), storage, sink)
}

fn brand_list_url(offset: u64) -> String {
    format!("https://shishadb.example.com/brands?offset={offset}")
}

fn brand_url(slug: &str) -> String {
    format!("https://shishadb.example.com/brands/{slug}")
}

fn product_url(brand: &str, slug: &str) -> String {
    format!("https://shishadb.example.com/brands/{brand}/products/{slug}")
}

#[tokio::test]
async fn test_single_page_discovery() {
    let transport = MapTransport::new().page(
        &brand_list_url(0),
        "item Al-Fakher https://shishadb.example.com/brands/Al-Fakher\n\
         item Adalya https://shishadb.example.com/brands/adalya\n\
         item AL-FAKHER https://shishadb.example.com/brands/AL-FAKHER\n\
         total 2",
    );
    let service = service(transport, Arc::new(MemoryCatalogStore::new()));

    let outcome = service.discover_brands().await.unwrap();
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.total_discovered, 2);
    assert_eq!(outcome.identifiers, vec!["al-fakher", "adalya"]);
    assert!(!outcome.has_more);
    assert_eq!(service.statistics().counters.brands_discovered, 2);
}

#[tokio::test]
async fn test_two_page_discovery_dedups_across_pages() {
    let transport = MapTransport::new()
        .page(
            &brand_list_url(0),
            "item Al-Fakher https://shishadb.example.com/brands/al-fakher\n\
             item Adalya https://shishadb.example.com/brands/adalya\n\
             more",
        )
        .page(
            &brand_list_url(2),
            // Same first entry repeated on page two.
            "item al-fakher https://shishadb.example.com/brands/al-fakher\n\
             item Serbetli https://shishadb.example.com/brands/serbetli",
        );
    let service = service(transport, Arc::new(MemoryCatalogStore::new()));

    let outcome = service.discover_brands().await.unwrap();
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.identifiers, vec!["al-fakher", "adalya", "serbetli"]);
    assert_eq!(outcome.total_discovered, 3);
}

#[tokio::test]
async fn test_discovery_stops_when_predicate_satisfied() {
    // Page reports more data but the total is already reached.
    let transport = MapTransport::new().page(
        &brand_list_url(0),
        "item A https://shishadb.example.com/brands/a\n\
         item B https://shishadb.example.com/brands/b\n\
         total 2\n\
         more",
    );
    let service = service(transport, Arc::new(MemoryCatalogStore::new()));

    let outcome = service.discover_brands().await.unwrap();
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.has_more);
    assert_eq!(outcome.total_discovered, 2);
}

#[tokio::test]
async fn test_empty_page_ends_discovery() {
    let transport = MapTransport::new()
        .page(
            &brand_list_url(0),
            "item A https://shishadb.example.com/brands/a\nmore",
        )
        .page(&brand_list_url(1), "no items here");
    let service = service(transport, Arc::new(MemoryCatalogStore::new()));

    let outcome = service.discover_brands().await.unwrap();
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.identifiers, vec!["a"]);
    assert!(!outcome.has_more);
}

#[tokio::test]
async fn test_discovery_propagates_fetch_errors() {
    let transport = MapTransport::new().fault(&brand_list_url(0));
    let service = service(transport, Arc::new(MemoryCatalogStore::new()));

    assert!(service.discover_brands().await.is_err());
}

#[tokio::test]
async fn test_discovery_survives_failed_status() {
    // 404 on the first page: not a transport error, so discovery ends
    // quietly with nothing accumulated.
    let service = service(MapTransport::new(), Arc::new(MemoryCatalogStore::new()));

    let outcome = service.discover_brands().await.unwrap();
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.total_discovered, 0);
}

#[tokio::test]
async fn test_checkpoint_cadence() {
    let mut transport = MapTransport::new();
    let mut offset = 0;
    for i in 0..5 {
        let body = if i < 4 {
            format!("item B{i} https://shishadb.example.com/brands/b{i}\nmore")
        } else {
            format!("item B{i} https://shishadb.example.com/brands/b{i}")
        };
        transport = transport.page(&brand_list_url(offset), &body);
        offset += 1;
    }

    let sink = Arc::new(CollectingSink::new());
    let settings = {
        let mut s = settings();
        s.scrape.checkpoint_interval = 2;
        s
    };
    let fetcher = PageFetcher::new(Arc::new(transport), Duration::ZERO, 0, Duration::ZERO);
    let service = ScrapeService::with_collaborators(
        settings,
        fetcher,
        Arc::new(LineParser),
        Arc::new(MemoryCatalogStore::new()),
        sink.clone(),
    );

    let outcome = service.discover_brands().await.unwrap();
    assert_eq!(outcome.iterations, 5);

    let recorded = sink.recorded();
    let iterations: Vec<u32> = recorded.iter().map(|c| c.iteration).collect();
    assert_eq!(iterations, vec![2, 4]);
    assert_eq!(recorded[1].counters.brands_discovered, 4);
}

#[tokio::test]
async fn test_discovery_iteration_cap() {
    // Every page points at another page forever.
    let mut transport = MapTransport::new();
    for offset in 0..10 {
        transport = transport.page(
            &brand_list_url(offset),
            &format!("item B{offset} https://shishadb.example.com/brands/b{offset}\nmore"),
        );
    }

    let settings = {
        let mut s = settings();
        s.scrape.max_discovery_iterations = 3;
        s
    };
    let fetcher = PageFetcher::new(Arc::new(transport), Duration::ZERO, 0, Duration::ZERO);
    let service = ScrapeService::with_collaborators(
        settings,
        fetcher,
        Arc::new(LineParser),
        Arc::new(MemoryCatalogStore::new()),
        Arc::new(LogCheckpointSink),
    );

    let outcome = service.discover_brands().await.unwrap();
    assert_eq!(outcome.iterations, 3);
    assert!(outcome.has_more);
}

#[tokio::test]
async fn test_brand_queue_drains_fully_regardless_of_width() {
    let transport = MapTransport::new()
        .page(&brand_url("a"), "brand A")
        .page(&brand_url("b"), "brand B")
        .page(&brand_url("c"), "brand C")
        .page(&brand_url("d"), "brand D");
    let store = Arc::new(MemoryCatalogStore::new());
    let service = {
        let mut s = settings();
        s.scrape.max_concurrent_brands = 2;
        let fetcher = PageFetcher::new(Arc::new(transport), Duration::ZERO, 0, Duration::ZERO);
        ScrapeService::with_collaborators(
            s,
            fetcher,
            Arc::new(LineParser),
            store.clone(),
            Arc::new(LogCheckpointSink),
        )
    };

    for slug in ["a", "b", "c", "d"] {
        service.queue_brand(slug);
    }
    let processed = service.process_brand_queue().await;
    assert_eq!(processed, 4);
    assert_eq!(store.brands().len(), 4);

    let stats = service.statistics();
    // Ever-enqueued stays at 4 after the drain; pending drops to zero.
    assert_eq!(stats.brand_jobs_queued, 4);
    assert_eq!(stats.brand_jobs_pending, 0);
    assert_eq!(stats.counters.brands_processed, 4);
}

#[tokio::test]
async fn test_duplicate_jobs_drop_without_error() {
    let transport = MapTransport::new().page(&brand_url("a"), "brand A");
    let store = Arc::new(MemoryCatalogStore::new());
    let service = service(transport, store.clone());

    service.queue_brand("a");
    service.queue_brand("a");
    let processed = service.process_brand_queue().await;

    assert_eq!(processed, 1);
    assert_eq!(store.brands().len(), 1);
    assert_eq!(service.statistics().counters.errors_encountered, 0);
}

#[tokio::test]
async fn test_fetch_failure_counts_error_and_continues() {
    let transport = MapTransport::new()
        .page(&brand_url("a"), "brand A")
        .fault(&brand_url("b"));
    let store = Arc::new(MemoryCatalogStore::new());
    let service = service(transport, store.clone());

    service.queue_brand("a");
    service.queue_brand("b");
    let processed = service.process_brand_queue().await;

    assert_eq!(processed, 1);
    assert_eq!(store.brands().len(), 1);
    assert_eq!(service.statistics().counters.errors_encountered, 1);
}

#[tokio::test]
async fn test_validation_failure_counts_error_and_tracks_operation() {
    // An absurdly long name survives parsing but fails validation.
    let transport =
        MapTransport::new().page(&brand_url("bad"), &format!("brand {}", "x".repeat(201)));
    let store = Arc::new(MemoryCatalogStore::new());
    let service = service(transport, store.clone());

    let operation_id = service
        .initialize_operation(OperationKind::BrandScrape)
        .await
        .unwrap();

    service.queue_brand("bad");
    let processed = service.process_brand_queue().await;

    assert_eq!(processed, 0);
    assert!(store.brands().is_empty());
    assert_eq!(service.statistics().counters.errors_encountered, 1);

    let operation = store.get_operation(&operation_id).await.unwrap().unwrap();
    assert_eq!(operation.error_count, 1);
}

#[tokio::test]
async fn test_persistence_failure_counts_error() {
    /// Storage that rejects every write.
    struct RejectingStore;

    #[async_trait]
    impl CatalogStorage for RejectingStore {
        async fn upsert_brand(&self, _: &crate::models::BrandRecord) -> Result<(), StorageError> {
            Err(StorageError::Other("disk full".into()))
        }
        async fn create_product(
            &self,
            _: &crate::models::ProductRecord,
        ) -> Result<(), StorageError> {
            Err(StorageError::Other("disk full".into()))
        }
        async fn create_operation(
            &self,
            _: &crate::models::OperationMetadata,
        ) -> Result<(), StorageError> {
            Ok(())
        }
        async fn update_operation(&self, _: &str, _: u64, _: u64) -> Result<(), StorageError> {
            Ok(())
        }
        async fn increment_error_count(&self, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Other("disk full".into()))
        }
        async fn complete_operation(&self, _: &str, _: u64, _: u64) -> Result<(), StorageError> {
            Ok(())
        }
        async fn fail_operation(&self, _: &str, _: &str) -> Result<(), StorageError> {
            Ok(())
        }
        async fn get_operation(
            &self,
            _: &str,
        ) -> Result<Option<crate::models::OperationMetadata>, StorageError> {
            Ok(None)
        }
        async fn brand_count(&self) -> Result<u64, StorageError> {
            Ok(0)
        }
        async fn product_count(&self) -> Result<u64, StorageError> {
            Ok(0)
        }
        async fn recent_operations(
            &self,
            _: usize,
        ) -> Result<Vec<crate::models::OperationMetadata>, StorageError> {
            Ok(vec![])
        }
    }

    let transport = MapTransport::new().page(&brand_url("a"), "brand A");
    let service = service(transport, Arc::new(RejectingStore));

    service.queue_brand("a");
    let processed = service.process_brand_queue().await;

    // The persist failure and the failing error-increment are both
    // absorbed; only the counter records the problem.
    assert_eq!(processed, 0);
    assert_eq!(service.statistics().counters.errors_encountered, 1);
}

#[tokio::test]
async fn test_product_queue_processing() {
    let transport = MapTransport::new()
        .page(&product_url("al-fakher", "double-apple"), "product Double Apple")
        .page(&product_url("al-fakher", "mint"), "product Mint");
    let store = Arc::new(MemoryCatalogStore::new());
    let service = service(transport, store.clone());

    service.queue_product("double-apple", "al-fakher");
    service.queue_product("mint", "al-fakher");
    let processed = service.process_product_queue().await;

    assert_eq!(processed, 2);
    let products = store.products();
    assert_eq!(products.len(), 2);
    assert!(products.iter().all(|p| p.brand == "al-fakher"));
    assert_eq!(service.statistics().counters.products_processed, 2);
}

#[tokio::test]
async fn test_progress_math() {
    let transport = MapTransport::new()
        .page(
            &brand_list_url(0),
            "item A https://shishadb.example.com/brands/a\n\
             item B https://shishadb.example.com/brands/b",
        )
        .page(&brand_url("a"), "brand A");
    let service = service(transport, Arc::new(MemoryCatalogStore::new()));

    // Nothing discovered yet: percentage defined as zero.
    let progress = service.progress();
    assert_eq!(progress.percentage, 0.0);

    service.discover_brands().await.unwrap();
    service.index.reset();

    service.queue_brand("a");
    service.process_brand_queue().await;

    let progress = service.progress();
    assert_eq!(progress.discovered, 2);
    assert_eq!(progress.processed, 1);
    assert_eq!(progress.percentage, 50.0);
}

#[tokio::test]
async fn test_terminal_transitions_without_operation_are_noops() {
    let store = Arc::new(MemoryCatalogStore::new());
    let service = service(MapTransport::new(), store.clone());

    service.complete_operation().await;
    service.fail_operation("nothing to fail").await;
    assert!(store.operations().is_empty());
}

#[tokio::test]
async fn test_operation_lifecycle_is_one_shot() {
    let transport = MapTransport::new().page(&brand_url("a"), "brand A");
    let store = Arc::new(MemoryCatalogStore::new());
    let service = service(transport, store.clone());

    let id = service
        .initialize_operation(OperationKind::BrandScrape)
        .await
        .unwrap();
    service.queue_brand("a");
    service.process_brand_queue().await;

    service.complete_operation().await;
    let stored = store.get_operation(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, crate::models::OperationStatus::Completed);
    assert_eq!(stored.brands_processed, 1);

    // The id was consumed: a second transition changes nothing.
    service.fail_operation("too late").await;
    let stored = store.get_operation(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, crate::models::OperationStatus::Completed);
}

#[tokio::test]
async fn test_reset_zeroes_counters_but_keeps_queues() {
    let transport = MapTransport::new().page(
        &brand_list_url(0),
        "item A https://shishadb.example.com/brands/a",
    );
    let service = service(transport, Arc::new(MemoryCatalogStore::new()));

    service.discover_brands().await.unwrap();
    service.queue_brand("a");
    assert_eq!(service.statistics().counters.brands_discovered, 1);

    service.reset();
    let stats = service.statistics();
    assert_eq!(stats.counters, CounterSnapshot::default());
    assert_eq!(stats.brand_jobs_queued, 1);
    assert_eq!(stats.brand_jobs_pending, 1);

    // Index was cleared with the counters.
    assert!(!service.index.add_brand("a"));
}
