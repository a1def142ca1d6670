//! Operation metadata tracking one end-to-end scrape run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a scrape operation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    BrandScrape,
    ProductScrape,
    FullScrape,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrandScrape => "brand_scrape",
            Self::ProductScrape => "product_scrape",
            Self::FullScrape => "full_scrape",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "brand_scrape" => Some(Self::BrandScrape),
            "product_scrape" => Some(Self::ProductScrape),
            "full_scrape" => Some(Self::FullScrape),
            _ => None,
        }
    }
}

/// Lifecycle state of a scrape operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    InProgress,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Persisted metadata for one scrape run.
///
/// Created once when a run starts and transitioned exactly once to a
/// terminal state. Counter fields are written back on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub brands_processed: u64,
    pub products_processed: u64,
    pub error_count: u64,
    pub error_details: Option<String>,
}

impl OperationMetadata {
    /// Start a new in-progress operation with a fresh id.
    pub fn begin(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: OperationStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            brands_processed: 0,
            products_processed: 0,
            error_count: 0,
            error_details: None,
        }
    }

    /// Transition to completed with final counters.
    pub fn complete(&mut self, brands_processed: u64, products_processed: u64) {
        self.status = OperationStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.brands_processed = brands_processed;
        self.products_processed = products_processed;
    }

    /// Transition to failed with a reason.
    pub fn fail(&mut self, reason: &str) {
        self.status = OperationStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_details = Some(reason.to_string());
    }
}
