//! Rate-limited page fetcher with retry and backoff.
//!
//! Ordinary HTTP failures come back as a failed [`FetchResult`];
//! `Err` is reserved for exhausted retries and transport faults outside
//! the expected taxonomy. Callers that need fail-fast semantics
//! propagate the `Err`, callers that degrade per item match on
//! `succeeded`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::pacing::{PacingStats, RequestPacer};
use super::transport::{PageTransport, TransportError};
use crate::config::Settings;

/// Outcome of one fetch, including ordinary failures.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub succeeded: bool,
    pub body: Option<String>,
    pub status_code: Option<u16>,
    pub failure: Option<FetchFailure>,
}

impl FetchResult {
    fn success(status_code: u16, body: String) -> Self {
        Self {
            succeeded: true,
            body: Some(body),
            status_code: Some(status_code),
            failure: None,
        }
    }

    fn failed(status_code: Option<u16>, kind: FailureKind, message: String) -> Self {
        Self {
            succeeded: false,
            body: None,
            status_code,
            failure: Some(FetchFailure { kind, message }),
        }
    }

    /// The body when the fetch succeeded.
    pub fn body_text(&self) -> Option<&str> {
        if self.succeeded {
            self.body.as_deref()
        } else {
            None
        }
    }
}

/// Structured descriptor for a failed fetch.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Non-retryable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The target URL could not be parsed.
    InvalidUrl,
    /// A 4xx status other than 429.
    ClientError,
}

/// Errors that abort a fetch outright.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("retries exhausted after {attempts} attempts for {url}: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("transport fault for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
}

/// Paced, retrying page fetcher.
pub struct PageFetcher {
    transport: Arc<dyn PageTransport>,
    pacer: RequestPacer,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl PageFetcher {
    /// Build a fetcher over an explicit transport.
    pub fn new(
        transport: Arc<dyn PageTransport>,
        request_delay: Duration,
        max_retries: u32,
        retry_base_delay: Duration,
    ) -> Self {
        Self {
            transport,
            pacer: RequestPacer::new(request_delay),
            max_retries,
            retry_base_delay,
        }
    }

    /// Build a production fetcher from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let transport = super::transport::HttpTransport::new(
            Duration::from_secs(settings.scrape.request_timeout_secs),
            settings.scrape.user_agent.as_deref(),
        );
        Self::new(
            Arc::new(transport),
            Duration::from_millis(settings.scrape.request_delay_ms),
            settings.scrape.max_retries,
            Duration::from_millis(settings.scrape.retry_base_delay_ms),
        )
    }

    /// Fetch one page, pacing every attempt and retrying transient
    /// failures with exponential backoff.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let mut attempt = 0u32;
        let mut last_error;

        loop {
            attempt += 1;
            self.pacer.acquire().await;

            match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    debug!("fetched {} (HTTP {})", url, response.status);
                    return Ok(FetchResult::success(response.status, response.body));
                }
                Ok(response) if retryable_status(response.status) => {
                    last_error = format!("HTTP {}", response.status);
                    debug!(
                        "transient HTTP {} from {} (attempt {})",
                        response.status, url, attempt
                    );
                }
                Ok(response) => {
                    debug!("HTTP {} from {}, not retrying", response.status, url);
                    return Ok(FetchResult::failed(
                        Some(response.status),
                        FailureKind::ClientError,
                        format!("HTTP {}", response.status),
                    ));
                }
                Err(TransportError::InvalidUrl(message)) => {
                    return Ok(FetchResult::failed(
                        None,
                        FailureKind::InvalidUrl,
                        message,
                    ));
                }
                Err(error) if error.is_retryable() => {
                    last_error = error.to_string();
                    debug!("transient error from {} (attempt {}): {}", url, attempt, error);
                }
                Err(error) => {
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        source: error,
                    });
                }
            }

            if attempt > self.max_retries {
                warn!("giving up on {} after {} attempts: {}", url, attempt, last_error);
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last_error,
                });
            }

            let backoff = self.retry_base_delay * 2u32.saturating_pow(attempt - 1);
            debug!("retrying {} in {:?}", url, backoff);
            tokio::time::sleep(backoff).await;
        }
    }

    /// Snapshot pacing counters for statistics.
    pub fn pacing_stats(&self) -> PacingStats {
        self.pacer.stats()
    }

    /// Clear pacing state, for tests and administrative use.
    pub fn reset_rate_limiter(&self) {
        self.pacer.reset();
    }
}

/// Statuses worth retrying: rate limits and server-side errors.
fn retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
