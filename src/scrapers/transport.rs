//! HTTP transport behind a trait so fetch behavior is testable.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default user agent sent with every request.
pub const USER_AGENT: &str = concat!("shishacquire/", env!("CARGO_PKG_VERSION"));

/// A completed HTTP exchange: status plus body text.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failures below the HTTP status level.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("transport fault: {0}")]
    Fault(String),
}

impl TransportError {
    /// Whether retrying the same request can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_))
    }
}

/// Issues a single GET and returns the status and body.
///
/// Implementations do no pacing and no retries; that policy lives in
/// [`PageFetcher`](super::PageFetcher).
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Production transport over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given timeout and optional user agent.
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        if url::Url::parse(url).is_err() {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() || error.is_request() {
        TransportError::Connect(error.to_string())
    } else if error.is_builder() {
        TransportError::InvalidUrl(error.to_string())
    } else {
        TransportError::Fault(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Timeout("t".into()).is_retryable());
        assert!(TransportError::Connect("c".into()).is_retryable());
        assert!(!TransportError::InvalidUrl("u".into()).is_retryable());
        assert!(!TransportError::Fault("f".into()).is_retryable());
    }
}
