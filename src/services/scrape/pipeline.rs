//! Extraction pipeline and queue draining.
//!
//! Each job runs fetch → parse → normalize → validate → duplicate check
//! → persist. Failures anywhere degrade to a dropped job: the batch
//! keeps going and the failure lands in the error counters and, when a
//! run is tracked, the operation record. Duplicates are dropped too but
//! are not errors.

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::types::Job;
use super::ScrapeService;
use crate::normalize::{normalize_brand, normalize_product, validate_brand, validate_product};

/// How one job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    /// Record persisted.
    Completed,
    /// Identifier already handled; dropped without error accounting.
    Duplicate,
    /// Pipeline failed; counted as an error.
    Failed,
}

impl ScrapeService {
    /// Drain the brand queue's current contents in concurrency-bounded
    /// batches. Returns how many jobs produced a persisted record.
    pub async fn process_brand_queue(&self) -> usize {
        let jobs = self.brand_jobs().take_pending();
        let width = self.settings.scrape.max_concurrent_brands.max(1);
        self.drain(jobs, width, "brand").await
    }

    /// Drain the product queue's current contents in concurrency-bounded
    /// batches. Returns how many jobs produced a persisted record.
    pub async fn process_product_queue(&self) -> usize {
        let jobs = self.product_jobs().take_pending();
        let width = self.settings.scrape.max_concurrent_products.max(1);
        self.drain(jobs, width, "product").await
    }

    /// Run jobs in batches of `width`; each batch joins before the next
    /// starts, so at most `width` pipelines are in flight at once.
    async fn drain(&self, jobs: Vec<Job>, width: usize, label: &str) -> usize {
        if jobs.is_empty() {
            debug!("no {} jobs pending", label);
            return 0;
        }

        info!(
            "processing {} {} jobs in batches of {}",
            jobs.len(),
            label,
            width
        );

        let mut completed = 0usize;
        for batch in jobs.chunks(width) {
            let outcomes = join_all(batch.iter().map(|job| self.run_job(job))).await;
            completed += outcomes
                .iter()
                .filter(|outcome| matches!(outcome, JobOutcome::Completed))
                .count();
        }

        info!("{} {} jobs produced records", completed, label);
        completed
    }

    async fn run_job(&self, job: &Job) -> JobOutcome {
        match job.parent.as_deref() {
            Some(brand) => self.run_product_job(&job.identifier, brand).await,
            None => self.run_brand_job(&job.identifier).await,
        }
    }

    async fn run_brand_job(&self, identifier: &str) -> JobOutcome {
        let url = self.settings.brand_page_url(identifier);

        let Some(body) = self.fetch_detail(&url, identifier).await else {
            return self.job_failed(identifier, "fetch").await;
        };

        let Some(detail) = self.parser.parse_brand_page(&body, identifier, &url) else {
            debug!("no usable brand record at {}", url);
            return self.job_failed(identifier, "parse").await;
        };

        let record = normalize_brand(detail);
        let report = validate_brand(&record);
        if !report.is_valid {
            warn!(
                "brand record {:?} failed validation: {}",
                record,
                report.errors.join("; ")
            );
            return self.job_failed(identifier, "validation").await;
        }

        if self.index.add_brand(&record.slug) {
            debug!("brand {} already handled, dropping", record.slug);
            return JobOutcome::Duplicate;
        }

        if let Err(error) = self.storage.upsert_brand(&record).await {
            warn!("failed to persist brand {}: {}", record.slug, error);
            return self.job_failed(identifier, "persist").await;
        }

        self.add_brand_processed();
        debug!("persisted brand {}", record.slug);
        JobOutcome::Completed
    }

    async fn run_product_job(&self, identifier: &str, brand: &str) -> JobOutcome {
        let url = self.settings.product_page_url(brand, identifier);

        let Some(body) = self.fetch_detail(&url, identifier).await else {
            return self.job_failed(identifier, "fetch").await;
        };

        let Some(detail) = self.parser.parse_product_page(&body, identifier, brand, &url) else {
            debug!("no usable product record at {}", url);
            return self.job_failed(identifier, "parse").await;
        };

        let record = normalize_product(detail);
        let report = validate_product(&record);
        if !report.is_valid {
            warn!(
                "product record {:?} failed validation: {}",
                record,
                report.errors.join("; ")
            );
            return self.job_failed(identifier, "validation").await;
        }

        if self.index.add_product(&record.brand, &record.slug) {
            debug!(
                "product {}/{} already handled, dropping",
                record.brand, record.slug
            );
            return JobOutcome::Duplicate;
        }

        if let Err(error) = self.storage.create_product(&record).await {
            warn!(
                "failed to persist product {}/{}: {}",
                record.brand, record.slug, error
            );
            return self.job_failed(identifier, "persist").await;
        }

        self.add_product_processed();
        debug!("persisted product {}/{}", record.brand, record.slug);
        JobOutcome::Completed
    }

    /// Fetch a detail page, absorbing every failure into None. The
    /// fail-fast error surface of the fetcher stops at this boundary.
    async fn fetch_detail(&self, url: &str, identifier: &str) -> Option<String> {
        match self.fetcher.fetch(url).await {
            Ok(page) if page.succeeded => page.body,
            Ok(page) => {
                debug!(
                    "detail fetch for {} failed (HTTP {:?})",
                    identifier, page.status_code
                );
                None
            }
            Err(error) => {
                debug!("detail fetch for {} errored: {}", identifier, error);
                None
            }
        }
    }

    /// Count a failed job and push it into the tracked operation,
    /// best-effort.
    async fn job_failed(&self, identifier: &str, stage: &str) -> JobOutcome {
        debug!("job for {} dropped at {} stage", identifier, stage);
        self.add_error();

        if let Some(operation_id) = self.retained_operation_id() {
            if let Err(error) = self.storage.increment_error_count(&operation_id).await {
                warn!(
                    "failed to record error against operation {}: {}",
                    operation_id, error
                );
            }
        }

        JobOutcome::Failed
    }
}
