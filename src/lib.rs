//! ripple-search: a darknet search engine
//!
//! Continuously discovers and fetches hidden-service pages through a SOCKS
//! proxy, normalizes their text, maintains an inverted index and a link
//! graph, and answers free-text queries ranked by TF-IDF combined with
//! PageRank.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod model;
pub mod normalizer;
pub mod query;
pub mod ranker;
pub mod scheduler;
pub mod store;

use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] crawler::FetchError),

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error(transparent)]
    Index(#[from] store::IndexError),

    #[error(transparent)]
    Graph(#[from] store::GraphError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a component invariant was violated: {0}")]
    Invariant(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid endpoint in config: {0}")]
    InvalidEndpoint(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{CrawlRecord, CrawlStatus, DocId, DocRecord};
