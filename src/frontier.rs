//! Work queue of (URL, depth) with dedup, shuffle, and restart-cycle semantics.

use crate::model::CrawlStatus;
use crate::store::{CrawlLog, DocStore, StoreError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

/// Default validation predicate: scheme is http/https and host ends in `.onion`.
pub fn default_url_predicate(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
        && url.host_str().map(|h| h.ends_with(".onion")).unwrap_or(false)
}

struct State {
    queue: VecDeque<(String, u32)>,
    seen: HashSet<String>,
}

/// Crawl frontier: a queue of not-yet-visited URLs plus the set of URLs ever
/// enqueued, so no URL is ever queued twice at the same time.
pub struct Frontier {
    state: Mutex<State>,
    depth_max: u32,
    predicate: Box<dyn Fn(&Url) -> bool + Send + Sync>,
}

impl Frontier {
    pub fn new(depth_max: u32) -> Self {
        Self::with_predicate(depth_max, default_url_predicate)
    }

    pub fn with_predicate(
        depth_max: u32,
        predicate: impl Fn(&Url) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                seen: HashSet::new(),
            }),
            depth_max,
            predicate: Box::new(predicate),
        }
    }

    /// Adds each URL at depth 0 if not already seen.
    pub fn seed(&self, urls: &[String]) {
        let mut state = self.state.lock().unwrap();
        for url in urls {
            if state.seen.insert(url.clone()) {
                state.queue.push_back((url.clone(), 0));
            }
        }
    }

    /// Whether `url` passes the Frontier's validation predicate, independent
    /// of depth or dedup. Used by the crawler to decide whether an outlink
    /// is even worth materializing a placeholder DocId for.
    pub fn accepts(&self, url: &Url) -> bool {
        (self.predicate)(url)
    }

    /// Enqueues `url` at `depth` if unseen and within `depth_max`.
    pub fn push(&self, url: &str, depth: u32) {
        if depth > self.depth_max {
            return;
        }
        if let Ok(parsed) = Url::parse(url) {
            if !(self.predicate)(&parsed) {
                return;
            }
        } else {
            return;
        }

        let mut state = self.state.lock().unwrap();
        if state.seen.insert(url.to_string()) {
            state.queue.push_back((url.to_string(), depth));
        }
    }

    /// Shuffles the queue with a PRNG seeded from the wall clock and removes
    /// up to `n` entries, returning them.
    pub fn pop_batch(&self, n: usize) -> Vec<(String, u32)> {
        let mut state = self.state.lock().unwrap();

        let mut items: Vec<(String, u32)> = state.queue.drain(..).collect();
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut rng = StdRng::seed_from_u64(seed);
        items.shuffle(&mut rng);

        let take = n.min(items.len());
        let batch = items.split_off(items.len() - take);

        state.queue = items.into();
        batch
    }

    /// Repopulates the frontier from every known URL in the DocStore at
    /// depth 0, and resets every `crawled` status back to `pending`.
    pub fn restart_cycle(&self, docs: &DocStore, crawl_log: &CrawlLog) -> Result<(), StoreError> {
        crawl_log.reset_crawled_to_pending()?;

        let records = docs.iter_all()?;
        let mut state = self.state.lock().unwrap();
        state.queue.clear();
        state.seen.clear();
        for record in records {
            if state.seen.insert(record.url.clone()) {
                state.queue.push_back((record.url, 0));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Marks a URL as no longer pending without removing it from `Seen`, used
/// when a fetch finishes and the crawler updates `CrawlLog` directly.
pub fn mark_terminal(crawl_log: &CrawlLog, url: &str, status: CrawlStatus) -> Result<(), StoreError> {
    crawl_log.set_status(url, status)
}
