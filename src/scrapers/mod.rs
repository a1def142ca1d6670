//! Page fetching and parsing for the catalog site.

mod fetch;
mod pacing;
mod parse;
mod transport;

pub use fetch::{FailureKind, FetchError, FetchFailure, FetchResult, PageFetcher};
pub use pacing::{PacingStats, RequestPacer};
pub use parse::{CatalogParser, DiscoveryScope, HtmlCatalogParser, PageInfo, ParsedListPage};
pub use transport::{HttpTransport, PageTransport, TransportError, TransportResponse};
