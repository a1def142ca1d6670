//! Scrape service types: jobs, statistics, and run outcomes.

use chrono::{DateTime, Utc};

/// What a queued job extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Brand,
    Product,
}

/// One unit of extraction work. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub kind: JobKind,
    pub identifier: String,
    /// Brand slug for product jobs.
    pub parent: Option<String>,
}

impl Job {
    pub fn brand(identifier: &str) -> Self {
        Self {
            kind: JobKind::Brand,
            identifier: identifier.to_string(),
            parent: None,
        }
    }

    pub fn product(identifier: &str, brand: &str) -> Self {
        Self {
            kind: JobKind::Product,
            identifier: identifier.to_string(),
            parent: Some(brand.to_string()),
        }
    }
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub brands_discovered: u64,
    pub brands_processed: u64,
    pub products_discovered: u64,
    pub products_processed: u64,
    pub errors_encountered: u64,
}

/// Counters plus queue and pacing figures.
///
/// Queue figures come in two flavors: `*_queued` counts every job ever
/// enqueued (monotonic), `*_pending` counts work not yet drained.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub counters: CounterSnapshot,
    pub brand_jobs_queued: usize,
    pub brand_jobs_pending: usize,
    pub product_jobs_queued: usize,
    pub product_jobs_pending: usize,
    pub requests_issued: u64,
    pub last_delay_ms: u64,
}

/// Overall completion ratio across brands and products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub discovered: u64,
    pub processed: u64,
    /// 0 when nothing has been discovered yet.
    pub percentage: f64,
}

/// Result of one paginated discovery walk.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// Fresh identifiers, in page order, without duplicates.
    pub identifiers: Vec<String>,
    pub total_discovered: usize,
    /// List pages walked.
    pub iterations: u32,
    /// Whether the last page still pointed at more data.
    pub has_more: bool,
}

/// Observability snapshot emitted during discovery.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub counters: CounterSnapshot,
    /// Discovery iteration at emission; 0 for manual snapshots.
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
}

/// Totals from a composed full scrape run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeSummary {
    pub brands_discovered: usize,
    pub brands_processed: usize,
    pub products_discovered: usize,
    pub products_processed: usize,
    pub errors_encountered: u64,
}
