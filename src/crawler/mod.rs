//! Crawler: drives Fetcher → HtmlAnalyzer → Normalizer → DocStore/InvertedIndex/LinkGraph.

mod analyzer;
mod control;
mod coordinator;
mod fetcher;

pub use analyzer::{analyze_html, AnalyzedPage};
pub use control::rotate_identity;
pub use coordinator::{crawl_one, run_crawl, CrawlOutcome};
pub use fetcher::{build_http_client, fetch_with_retry, FetchError, FetchOutcome, RetryPolicy};
