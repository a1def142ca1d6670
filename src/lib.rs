//! Shishacquire - shisha catalog acquisition system.
//!
//! Walks a paginated catalog site, enumerates brand and product pages,
//! fetches them under a rate limit, and persists normalized records.

pub mod config;
pub mod models;
pub mod normalize;
pub mod repository;
pub mod scrapers;
pub mod services;
