pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod graph;
pub mod normalize;
pub mod result;

pub use crawler::{CrawlOutput, Crawler, ProgressCallback, ResultCallback, validate_seed};
pub use error::{FetchFailure, ScanError};
pub use extract::{HtmlLinkExtractor, LinkExtractor};
pub use fetch::{Fetcher, HttpFetcher};
pub use frontier::TraversalOrder;
pub use graph::{LinkEdge, LinkGraph};
pub use normalize::normalize_and_filter;
pub use result::CrawlResult;
