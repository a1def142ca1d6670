//! Data models for catalog records and scrape operations.

mod catalog;
mod operation;

pub use catalog::{BrandDetail, BrandRecord, ListingRecord, ProductDetail, ProductRecord};
pub use operation::{OperationKind, OperationMetadata, OperationStatus};
