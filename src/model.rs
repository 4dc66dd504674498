//! Core data model shared by the store, ranker, and query layers.

use std::collections::HashMap;

/// Opaque, monotonically assigned identifier for a document in the DocStore.
///
/// Never reused within the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(pub i64);

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized index term: non-empty, no whitespace, no non-word characters.
pub type Term = String;

/// A document record as stored in the DocStore.
///
/// `content` is the space-joined token stream after normalization; an empty
/// string marks a placeholder record created for a link target that has not
/// yet been fetched (see `LinkGraph::add_edges`).
#[derive(Debug, Clone)]
pub struct DocRecord {
    pub id: DocId,
    pub url: String,
    pub content: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub meta: HashMap<String, String>,
}

impl DocRecord {
    /// Number of tokens in `content`.
    pub fn token_count(&self) -> usize {
        if self.content.is_empty() {
            0
        } else {
            self.content.split(' ').count()
        }
    }
}

/// Per-URL crawl status, persisted in the crawl log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    Pending,
    InFlight,
    Crawled,
    Failed,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Crawled => "crawled",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "crawled" => Some(Self::Crawled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A crawl-log record: the outcome of the most recent crawl attempt for a URL.
#[derive(Debug, Clone)]
pub struct CrawlRecord {
    pub url: String,
    pub last_checked: Option<chrono::DateTime<chrono::Utc>>,
    pub response_time_ms: Option<u64>,
    pub outcome: String,
    pub status: CrawlStatus,
}

impl CrawlRecord {
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            last_checked: None,
            response_time_ms: None,
            outcome: String::new(),
            status: CrawlStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_count_of_placeholder_is_zero() {
        let record = DocRecord {
            id: DocId(1),
            url: "http://a.onion/".to_string(),
            content: String::new(),
            title: None,
            date: None,
            meta: HashMap::new(),
        };
        assert_eq!(record.token_count(), 0);
    }

    #[test]
    fn test_crawl_status_roundtrip() {
        for status in [
            CrawlStatus::Pending,
            CrawlStatus::InFlight,
            CrawlStatus::Crawled,
            CrawlStatus::Failed,
        ] {
            assert_eq!(CrawlStatus::from_str(status.as_str()), Some(status));
        }
    }
}
