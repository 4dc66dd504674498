//! Crawler: drives Fetcher -> HtmlAnalyzer -> Normalizer -> DocStore/InvertedIndex/LinkGraph,
//! one URL at a time, honoring the `pending -> {crawled | failed}` state machine.

use super::analyzer::analyze_html;
use super::fetcher::{fetch_with_retry, FetchError, RetryPolicy};
use crate::frontier::Frontier;
use crate::model::CrawlStatus;
use crate::normalizer::normalize;
use crate::scheduler::ShutdownSignal;
use crate::store::Store;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// The outcome of one `crawl_one` attempt.
#[derive(Debug)]
pub enum CrawlOutcome {
    /// Already `crawled`; nothing was done.
    Skipped,
    /// Fetched, indexed, and its outlinks were pushed to the Frontier.
    Crawled { doc_id: i64, outlinks_pushed: usize },
    /// Exhausted retries or hit a permanent/parse failure.
    Failed(String),
    /// A durable-write operation on DocStore/InvertedIndex/LinkGraph/CrawlLog
    /// returned an I/O error (§7 taxonomy item 4). Distinct from `Failed` so
    /// the driver can count consecutive occurrences toward the abort
    /// threshold, rather than treating it like an ordinary permanent failure.
    StoreFailure(String),
}

/// Drives one URL at depth `d` through steps 1-4 of §4.G to completion.
pub async fn crawl_one(
    client: &Client,
    url: &str,
    depth: u32,
    store: &Store,
    frontier: &Frontier,
    retry_policy: &RetryPolicy,
    max_body_bytes: u64,
) -> CrawlOutcome {
    if let Ok(Some(record)) = store.crawl_log.get(url) {
        if record.status == CrawlStatus::Crawled {
            return CrawlOutcome::Skipped;
        }
    }

    let _ = store.crawl_log.set_status(url, CrawlStatus::InFlight);

    let base_url = match reqwest::Url::parse(url) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(url, error = %e, "unparseable URL, marking failed");
            record_failure(store, url, &e.to_string());
            return CrawlOutcome::Failed(e.to_string());
        }
    };

    let outcome = match fetch_with_retry(client, url, max_body_bytes, retry_policy).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(url, depth, error = %e, "fetch failed, giving up for this cycle");
            record_failure_with_timing(store, url, &e, 0);
            return CrawlOutcome::Failed(e.to_string());
        }
    };

    let response_time_ms = outcome.response_time_ms;
    let analyzed = analyze_html(&outcome.body, &base_url);
    let tokens = normalize(&analyzed.text);

    let doc_id = match store
        .docs
        .insert(url, &tokens.join(" "), analyzed.title.as_deref(), None, &analyzed.meta)
    {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(url, error = %e, "store failure on docstore insert");
            record_failure_with_timing_str(store, url, &e.to_string(), response_time_ms);
            return CrawlOutcome::StoreFailure(e.to_string());
        }
    };

    if let Err(e) = store.index.add_document(doc_id, &tokens) {
        // AlreadyIndexed can only happen on a racing re-crawl of the same
        // DocId; the indexed copy is authoritative, so we proceed to record
        // outlinks rather than treat it as fatal.
        tracing::debug!(url, error = %e, "add_document skipped");
    }

    let mut outlinks_pushed = 0usize;
    let mut dsts = HashSet::new();
    for outlink in &analyzed.outlinks {
        let Ok(parsed) = reqwest::Url::parse(outlink) else {
            continue;
        };
        if !frontier.accepts(&parsed) {
            continue;
        }
        let vid = match store.docs.insert(outlink, "", None, None, &Default::default()) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(outlink, error = %e, "failed to materialize placeholder");
                continue;
            }
        };
        dsts.insert(vid);
        frontier.push(outlink, depth + 1);
        outlinks_pushed += 1;
    }
    if !dsts.is_empty() {
        if let Err(e) = store.graph.add_edges(doc_id, &dsts) {
            tracing::error!(url, error = %e, "store failure recording outbound edges");
        }
    }

    let now = chrono::Utc::now();
    if let Err(e) = store
        .crawl_log
        .record(url, now, response_time_ms, "success", CrawlStatus::Crawled)
    {
        tracing::error!(url, error = %e, "store failure recording crawl log");
    }

    CrawlOutcome::Crawled {
        doc_id: doc_id.0,
        outlinks_pushed,
    }
}

fn record_failure(store: &Store, url: &str, outcome: &str) {
    record_failure_with_timing_str(store, url, outcome, 0);
}

fn record_failure_with_timing(store: &Store, url: &str, err: &FetchError, response_time_ms: u64) {
    record_failure_with_timing_str(store, url, &err.to_string(), response_time_ms);
}

fn record_failure_with_timing_str(store: &Store, url: &str, outcome: &str, response_time_ms: u64) {
    let now = chrono::Utc::now();
    if let Err(e) = store
        .crawl_log
        .record(url, now, response_time_ms, outcome, CrawlStatus::Failed)
    {
        tracing::error!(url, error = %e, "store failure recording crawl failure");
    }
}

/// Drives a bounded worker pool against the Frontier until `shutdown` is
/// signaled. Workers pop one URL at a time; when the Frontier empties, the
/// driver calls `restart_cycle` and sleeps briefly before trying again.
///
/// Tracks consecutive `StoreFailure` outcomes; once `store_failure_threshold`
/// is reached in a row, the Scheduler is told to abort (§7 taxonomy item 4:
/// "repeated store failures above a threshold cause the Scheduler to abort
/// with a non-zero exit code"). Any non-store-failure outcome resets the
/// counter, since the threshold is about a stuck, failing store, not the
/// ordinary churn of dead links.
pub async fn run_crawl(
    client: Client,
    store: Arc<Store>,
    frontier: Arc<Frontier>,
    workers: u32,
    retry_policy: RetryPolicy,
    max_body_bytes: u64,
    store_failure_threshold: u32,
    shutdown: ShutdownSignal,
) -> bool {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(workers as usize));
    let consecutive_store_failures = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let aborted = Arc::new(std::sync::atomic::AtomicBool::new(false));

    loop {
        if shutdown.is_triggered() || aborted.load(std::sync::atomic::Ordering::SeqCst) {
            tracing::info!("stopping crawl loop");
            break;
        }

        let batch = frontier.pop_batch(workers as usize);
        if batch.is_empty() {
            if let Err(e) = frontier.restart_cycle(&store.docs, &store.crawl_log) {
                tracing::error!(error = %e, "restart_cycle failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = shutdown.cancelled() => break,
            }
            continue;
        }

        let mut handles = Vec::with_capacity(batch.len());
        for (url, depth) in batch {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let client = client.clone();
            let store = store.clone();
            let frontier = frontier.clone();
            let retry_policy = retry_policy.clone();
            let shutdown = shutdown.clone();
            let consecutive_store_failures = consecutive_store_failures.clone();
            let aborted = aborted.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                if shutdown.is_triggered() {
                    return;
                }
                tracing::info!(url, depth, "crawling");
                let outcome =
                    crawl_one(&client, &url, depth, &store, &frontier, &retry_policy, max_body_bytes)
                        .await;
                match outcome {
                    CrawlOutcome::Crawled { doc_id, outlinks_pushed } => {
                        tracing::info!(url, doc_id, outlinks_pushed, "crawled");
                        consecutive_store_failures.store(0, std::sync::atomic::Ordering::SeqCst);
                    }
                    CrawlOutcome::Failed(reason) => {
                        tracing::warn!(url, reason, "crawl failed");
                        consecutive_store_failures.store(0, std::sync::atomic::Ordering::SeqCst);
                    }
                    CrawlOutcome::Skipped => {}
                    CrawlOutcome::StoreFailure(reason) => {
                        let count = consecutive_store_failures
                            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                            + 1;
                        tracing::error!(url, reason, count, "store failure");
                        if count >= store_failure_threshold {
                            tracing::error!(
                                count,
                                threshold = store_failure_threshold,
                                "store failure threshold exceeded, aborting scheduler"
                            );
                            aborted.store(true, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    aborted.load(std::sync::atomic::Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::build_http_client;
    use crate::store::schema::initialize_schema;
    use rusqlite::Connection;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn new_store() -> Store {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        Store {
            docs: crate::store::DocStore::new(conn.clone()),
            index: crate::store::InvertedIndex::load_with_shards(conn.clone(), 4).unwrap(),
            graph: crate::store::LinkGraph::load(conn.clone()).unwrap(),
            crawl_log: crate::store::CrawlLog::new(conn),
        }
    }

    fn permissive_frontier() -> Frontier {
        Frontier::with_predicate(10, |_url| true)
    }

    /// A store whose `docs` table has been dropped out from under it, so any
    /// `DocStore::insert` call fails with a database error.
    fn store_with_docs_table_dropped() -> Store {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute("DROP TABLE docs", []).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        Store {
            docs: crate::store::DocStore::new(conn.clone()),
            index: crate::store::InvertedIndex::load_with_shards(conn.clone(), 4).unwrap(),
            graph: crate::store::LinkGraph::load(conn.clone()).unwrap(),
            crawl_log: crate::store::CrawlLog::new(conn),
        }
    }

    #[tokio::test]
    async fn test_crawl_one_success_indexes_document_and_outlinks() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><title>Home</title></head><body>
                    <p>hello darknet world</p>
                    <a href="/other">link</a>
                </body></html>"#,
            ))
            .mount(&mock_server)
            .await;

        let store = new_store();
        let frontier = permissive_frontier();
        let client = build_http_client("127.0.0.1:1", "test/1.0", Duration::from_secs(5), 10)
            .unwrap_or_else(|_| reqwest::Client::new());
        // SOCKS proxy isn't reachable in tests; use a direct client instead,
        // exercising the same fetch_with_retry/analyze_html/index pipeline.
        let client = reqwest::Client::builder().build().unwrap_or(client);

        let url = format!("{}/", mock_server.uri());
        let outcome = crawl_one(
            &client,
            &url,
            0,
            &store,
            &frontier,
            &RetryPolicy { max_retries: 0, ..RetryPolicy::default() },
            10 * 1024 * 1024,
        )
        .await;

        match outcome {
            CrawlOutcome::Crawled { outlinks_pushed, .. } => {
                assert_eq!(outlinks_pushed, 1);
            }
            other => panic!("expected Crawled, got {other:?}"),
        }

        assert_eq!(store.docs.count().unwrap(), 2); // the page + its placeholder outlink
        let record = store.crawl_log.get(&url).unwrap().unwrap();
        assert_eq!(record.status, CrawlStatus::Crawled);
    }

    #[tokio::test]
    async fn test_crawl_one_skips_already_crawled() {
        let store = new_store();
        let frontier = permissive_frontier();
        let client = reqwest::Client::new();

        store
            .crawl_log
            .record("http://a.onion/", chrono::Utc::now(), 1, "success", CrawlStatus::Crawled)
            .unwrap();

        let outcome = crawl_one(
            &client,
            "http://a.onion/",
            0,
            &store,
            &frontier,
            &RetryPolicy::default(),
            1024,
        )
        .await;

        assert!(matches!(outcome, CrawlOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_crawl_one_permanent_failure_marks_failed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let store = new_store();
        let frontier = permissive_frontier();
        let client = reqwest::Client::new();
        let url = format!("{}/", mock_server.uri());

        let outcome = crawl_one(
            &client,
            &url,
            0,
            &store,
            &frontier,
            &RetryPolicy { max_retries: 0, ..RetryPolicy::default() },
            1024 * 1024,
        )
        .await;

        assert!(matches!(outcome, CrawlOutcome::Failed(_)));
        let record = store.crawl_log.get(&url).unwrap().unwrap();
        assert_eq!(record.status, CrawlStatus::Failed);
    }

    #[tokio::test]
    async fn test_crawl_one_reports_store_failure_when_docstore_insert_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>x</body></html>"))
            .mount(&mock_server)
            .await;

        let store = store_with_docs_table_dropped();
        let frontier = permissive_frontier();
        let client = reqwest::Client::new();
        let url = format!("{}/", mock_server.uri());

        let outcome = crawl_one(
            &client,
            &url,
            0,
            &store,
            &frontier,
            &RetryPolicy { max_retries: 0, ..RetryPolicy::default() },
            1024 * 1024,
        )
        .await;

        assert!(matches!(outcome, CrawlOutcome::StoreFailure(_)));
    }

    #[tokio::test]
    async fn test_run_crawl_aborts_after_store_failure_threshold() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>x</body></html>"))
            .mount(&mock_server)
            .await;

        let store = Arc::new(store_with_docs_table_dropped());

        let frontier = Arc::new(permissive_frontier());
        frontier.seed(&[format!("{}/", mock_server.uri())]);

        let client = reqwest::Client::new();
        let shutdown = ShutdownSignal::new();

        let aborted = tokio::time::timeout(
            Duration::from_secs(5),
            run_crawl(
                client,
                store,
                frontier,
                1,
                RetryPolicy { max_retries: 0, ..RetryPolicy::default() },
                1024 * 1024,
                1,
                shutdown,
            ),
        )
        .await
        .expect("run_crawl should abort promptly rather than loop forever");

        assert!(aborted, "run_crawl should report an abort once the threshold is hit");
    }
}
