//! Scrape orchestration.
//!
//! One `ScrapeService` instance drives a whole run: it owns the paced
//! fetcher, the duplicate index, both job queues, the run counters, and
//! the retained operation id. Discovery walks are fail-fast: a fetch
//! error aborts the walk, because without a list page nothing downstream
//! can proceed. Extraction jobs are fail-soft: any failure degrades to a
//! dropped job and the batch moves on. These are two deliberate,
//! distinct contracts; callers rely on both.

mod checkpoint;
mod dedup;
mod discovery;
mod pipeline;
mod queue;
#[cfg(test)]
mod tests;
mod types;

pub use checkpoint::{CheckpointSink, LogCheckpointSink};
pub use dedup::DuplicateIndex;
pub use queue::JobQueue;
pub use types::{
    Checkpoint, CounterSnapshot, DiscoveryOutcome, Job, JobKind, Progress, ScrapeSummary,
    Statistics,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::models::OperationKind;
use crate::repository::{CatalogStorage, StorageError};
use crate::scrapers::{CatalogParser, FetchError, HtmlCatalogParser, PageFetcher};

/// Run counters. All increments are monotonic; `reset` zeroes the set
/// as a whole.
#[derive(Debug, Default)]
struct Counters {
    brands_discovered: AtomicU64,
    brands_processed: AtomicU64,
    products_discovered: AtomicU64,
    products_processed: AtomicU64,
    errors_encountered: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            brands_discovered: self.brands_discovered.load(Ordering::Relaxed),
            brands_processed: self.brands_processed.load(Ordering::Relaxed),
            products_discovered: self.products_discovered.load(Ordering::Relaxed),
            products_processed: self.products_processed.load(Ordering::Relaxed),
            errors_encountered: self.errors_encountered.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.brands_discovered.store(0, Ordering::Relaxed);
        self.brands_processed.store(0, Ordering::Relaxed);
        self.products_discovered.store(0, Ordering::Relaxed);
        self.products_processed.store(0, Ordering::Relaxed);
        self.errors_encountered.store(0, Ordering::Relaxed);
    }
}

/// Orchestrates discovery, extraction, and the operation lifecycle for
/// one catalog site.
pub struct ScrapeService {
    pub(crate) settings: Settings,
    pub(crate) fetcher: PageFetcher,
    pub(crate) parser: Arc<dyn CatalogParser>,
    pub(crate) storage: Arc<dyn CatalogStorage>,
    pub(crate) index: DuplicateIndex,
    brand_jobs: JobQueue,
    product_jobs: JobQueue,
    counters: Counters,
    /// Id of the operation started by `initialize_operation`, consumed
    /// by the one-shot terminal transitions.
    operation_id: Mutex<Option<String>>,
    pub(crate) checkpoint_sink: Arc<dyn CheckpointSink>,
}

impl ScrapeService {
    /// Build a service with production collaborators.
    pub fn new(settings: Settings, storage: Arc<dyn CatalogStorage>) -> Self {
        let fetcher = PageFetcher::from_settings(&settings);
        let parser = Arc::new(HtmlCatalogParser::new(
            settings.site.base_url.clone(),
            settings.selectors.clone(),
        ));
        Self::with_collaborators(settings, fetcher, parser, storage, Arc::new(LogCheckpointSink))
    }

    /// Build a service with explicit collaborators.
    pub fn with_collaborators(
        settings: Settings,
        fetcher: PageFetcher,
        parser: Arc<dyn CatalogParser>,
        storage: Arc<dyn CatalogStorage>,
        checkpoint_sink: Arc<dyn CheckpointSink>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            parser,
            storage,
            index: DuplicateIndex::new(),
            brand_jobs: JobQueue::new(),
            product_jobs: JobQueue::new(),
            counters: Counters::default(),
            operation_id: Mutex::new(None),
            checkpoint_sink,
        }
    }

    /// Enqueue a brand extraction job.
    pub fn queue_brand(&self, identifier: &str) {
        self.brand_jobs.push(Job::brand(identifier));
    }

    /// Enqueue a product extraction job under a brand.
    pub fn queue_product(&self, identifier: &str, brand: &str) {
        self.product_jobs.push(Job::product(identifier, brand));
    }

    pub(crate) fn brand_jobs(&self) -> &JobQueue {
        &self.brand_jobs
    }

    pub(crate) fn product_jobs(&self) -> &JobQueue {
        &self.product_jobs
    }

    /// Counters plus queue and pacing figures.
    pub fn statistics(&self) -> Statistics {
        let pacing = self.fetcher.pacing_stats();
        Statistics {
            counters: self.counters.snapshot(),
            brand_jobs_queued: self.brand_jobs.enqueued(),
            brand_jobs_pending: self.brand_jobs.pending(),
            product_jobs_queued: self.product_jobs.enqueued(),
            product_jobs_pending: self.product_jobs.pending(),
            requests_issued: pacing.requests_issued,
            last_delay_ms: pacing.last_delay_ms,
        }
    }

    /// Completion ratio across brands and products together.
    pub fn progress(&self) -> Progress {
        let counters = self.counters.snapshot();
        let discovered = counters.brands_discovered + counters.products_discovered;
        let processed = counters.brands_processed + counters.products_processed;
        let percentage = if discovered == 0 {
            0.0
        } else {
            100.0 * processed as f64 / discovered as f64
        };
        Progress {
            discovered,
            processed,
            percentage,
        }
    }

    /// Log the current progress and counters.
    pub fn log_progress(&self) {
        let progress = self.progress();
        let stats = self.statistics();
        info!(
            "progress: {}/{} items ({:.1}%), {} errors, queues: {} brand / {} product jobs",
            progress.processed,
            progress.discovered,
            progress.percentage,
            stats.counters.errors_encountered,
            stats.brand_jobs_queued,
            stats.product_jobs_queued,
        );
    }

    /// Emit a manual checkpoint snapshot.
    pub fn save_checkpoint(&self) {
        self.emit_checkpoint(0);
    }

    pub(crate) fn emit_checkpoint(&self, iteration: u32) {
        let checkpoint = Checkpoint {
            counters: self.counters.snapshot(),
            iteration,
            created_at: Utc::now(),
        };
        self.checkpoint_sink.record(&checkpoint);
    }

    /// Zero all counters and clear the duplicate index. Queues keep
    /// their contents and their ever-enqueued history.
    pub fn reset(&self) {
        self.counters.reset();
        self.index.reset();
        debug!("service state reset");
    }

    pub(crate) fn add_brands_discovered(&self, n: u64) {
        self.counters.brands_discovered.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_products_discovered(&self, n: u64) {
        self.counters.products_discovered.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_brand_processed(&self) {
        self.counters.brands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_product_processed(&self) {
        self.counters.products_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_error(&self) {
        self.counters.errors_encountered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn retained_operation_id(&self) -> Option<String> {
        self.operation_id.lock().expect("operation lock poisoned").clone()
    }

    /// Create and retain a new operation record for this run.
    pub async fn initialize_operation(
        &self,
        kind: OperationKind,
    ) -> Result<String, StorageError> {
        let operation = crate::models::OperationMetadata::begin(kind);
        self.storage.create_operation(&operation).await?;
        info!("started {} operation {}", kind.as_str(), operation.id);
        let mut retained = self.operation_id.lock().expect("operation lock poisoned");
        *retained = Some(operation.id.clone());
        Ok(operation.id)
    }

    /// Mark the retained operation completed with the final counters.
    /// A safe no-op when no operation was initialized; one-shot after.
    pub async fn complete_operation(&self) {
        let id = {
            let mut retained = self.operation_id.lock().expect("operation lock poisoned");
            retained.take()
        };
        let Some(id) = id else {
            debug!("no active operation to complete");
            return;
        };
        let counters = self.counters.snapshot();
        if let Err(error) = self
            .storage
            .complete_operation(&id, counters.brands_processed, counters.products_processed)
            .await
        {
            warn!("failed to mark operation {} completed: {}", id, error);
        } else {
            info!("operation {} completed", id);
        }
    }

    /// Mark the retained operation failed. A safe no-op when no
    /// operation was initialized; one-shot after.
    pub async fn fail_operation(&self, reason: &str) {
        let id = {
            let mut retained = self.operation_id.lock().expect("operation lock poisoned");
            retained.take()
        };
        let Some(id) = id else {
            debug!("no active operation to fail");
            return;
        };
        if let Err(error) = self.storage.fail_operation(&id, reason).await {
            warn!("failed to mark operation {} failed: {}", id, error);
        } else {
            warn!("operation {} failed: {}", id, reason);
        }
    }

    /// Push current processed counters into the operation record.
    async fn flush_operation_progress(&self) {
        let Some(id) = self.retained_operation_id() else {
            return;
        };
        let counters = self.counters.snapshot();
        if let Err(error) = self
            .storage
            .update_operation(&id, counters.brands_processed, counters.products_processed)
            .await
        {
            warn!("failed to update operation {}: {}", id, error);
        }
    }

    /// Run a complete scrape: enumerate brands, extract them, then
    /// enumerate and extract each brand's products.
    ///
    /// Discovery keeps its fail-fast contract here: a fetch error in any
    /// paginated walk fails the operation and aborts the run. The
    /// duplicate index is cleared between the enumeration and extraction
    /// phases so that extraction claims identifiers afresh; within each
    /// phase it still drops repeats.
    pub async fn run_full_scrape(&self) -> Result<ScrapeSummary, FetchError> {
        if let Err(error) = self.initialize_operation(OperationKind::FullScrape).await {
            warn!("operation metadata unavailable, continuing untracked: {}", error);
        }

        let brands = match self.discover_brands().await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.fail_operation(&error.to_string()).await;
                return Err(error);
            }
        };
        self.index.reset();

        for identifier in &brands.identifiers {
            self.queue_brand(identifier);
        }
        let brands_processed = self.process_brand_queue().await;
        self.flush_operation_progress().await;
        self.log_progress();

        let mut products_discovered = 0usize;
        for brand in &brands.identifiers {
            match self.discover_products(brand).await {
                Ok(outcome) => {
                    products_discovered += outcome.total_discovered;
                    for identifier in &outcome.identifiers {
                        self.queue_product(identifier, brand);
                    }
                }
                Err(error) => {
                    self.fail_operation(&error.to_string()).await;
                    return Err(error);
                }
            }
        }
        self.index.reset();

        let products_processed = self.process_product_queue().await;
        self.complete_operation().await;
        self.log_progress();

        let counters = self.counters.snapshot();
        Ok(ScrapeSummary {
            brands_discovered: brands.total_discovered,
            brands_processed,
            products_discovered,
            products_processed,
            errors_encountered: counters.errors_encountered,
        })
    }
}
