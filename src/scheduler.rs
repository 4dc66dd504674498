//! Scheduler: owns the worker pool, the periodic ranker-refresh task, and
//! the graceful-shutdown path on SIGINT/SIGTERM.

use crate::config::Config;
use crate::crawler::{build_http_client, rotate_identity, run_crawl, RetryPolicy};
use crate::frontier::Frontier;
use crate::ranker::{build_snapshot, PageRankParams, RankerSnapshot};
use crate::store::Store;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// A clonable, broadcastable "stop now" flag shared between the crawl loop,
/// the ranker-refresh loop, and the driver awaiting OS signals.
#[derive(Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger` has been (or already was) called.
    pub async fn cancelled(&self) {
        if self.is_triggered() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// How long the Scheduler waits for in-flight fetches to drain on shutdown
/// before proceeding to flush stores and exit regardless.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Drives the full crawl+rank lifecycle: opens the store, seeds the
/// Frontier, and spawns the crawl worker pool alongside a periodic ranker
/// refresh, until `shutdown` is triggered.
pub struct Scheduler {
    pub store: Arc<Store>,
    pub frontier: Arc<Frontier>,
    snapshot_tx: watch::Sender<Arc<RankerSnapshot>>,
    snapshot_rx: watch::Receiver<Arc<RankerSnapshot>>,
    config: Config,
}

impl Scheduler {
    /// Opens the store at `config.storage.data_dir/ripple.db`, seeds the
    /// Frontier from `config.seeds`, and builds an empty initial snapshot.
    pub fn new(config: Config) -> Result<Self, crate::EngineError> {
        let data_dir = Path::new(&config.storage.data_dir);
        let db_path = data_dir.join("ripple.db");
        let store = Arc::new(crate::store::open_store(&db_path)?);

        let predicate_suffix = config.url_policy.required_suffix.clone();
        let allowed_schemes = config.url_policy.allowed_schemes.clone();
        let frontier = Arc::new(Frontier::with_predicate(
            config.crawler.depth_max,
            move |url| {
                allowed_schemes.iter().any(|s| s == url.scheme())
                    && url
                        .host_str()
                        .map(|h| h.ends_with(&predicate_suffix))
                        .unwrap_or(false)
            },
        ));
        frontier.seed(&config.seeds);

        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(RankerSnapshot::default()));

        Ok(Self {
            store,
            frontier,
            snapshot_tx,
            snapshot_rx,
            config,
        })
    }

    /// A receiver that always observes the most recently published snapshot.
    pub fn snapshot_receiver(&self) -> watch::Receiver<Arc<RankerSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Runs the crawl worker pool and the periodic ranker refresh until
    /// `shutdown` fires, then drains in-flight work up to `SHUTDOWN_GRACE`.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<(), crate::EngineError> {
        let client = build_http_client(
            &self.config.proxy.socks_endpoint,
            &format!(
                "{}/{} (+{}; {})",
                self.config.user_agent.crawler_name,
                self.config.user_agent.crawler_version,
                self.config.user_agent.contact_url,
                self.config.user_agent.contact_email,
            ),
            Duration::from_secs(self.config.crawler.request_timeout_s),
            self.config.crawler.connection_pool_size,
        )
        .map_err(|e| crate::EngineError::Invariant(format!("failed to build HTTP client: {e}")))?;

        // Request a fresh circuit before the first fetch, mirroring how a
        // Tor-backed session in this stack is conventionally established.
        // Rotation failures are logged but never abort the crawl (§4.A).
        if let Some(control_endpoint) = &self.config.proxy.control_endpoint {
            match rotate_identity(control_endpoint, self.config.proxy.control_password.as_deref())
                .await
            {
                Ok(()) => tracing::info!(control_endpoint, "rotated circuit identity"),
                Err(e) => tracing::warn!(control_endpoint, error = %e, "circuit rotation failed, continuing on existing circuit"),
            }
        }

        let retry_policy = RetryPolicy {
            max_retries: self.config.crawler.retry_max,
            ..RetryPolicy::default()
        };

        let mut crawl_task = tokio::spawn(run_crawl(
            client,
            self.store.clone(),
            self.frontier.clone(),
            self.config.crawler.workers,
            retry_policy,
            self.config.crawler.max_body_bytes,
            self.config.crawler.store_failure_threshold,
            shutdown.clone(),
        ));

        let refresh_task = tokio::spawn(refresh_loop(
            self.store.clone(),
            self.snapshot_tx.clone(),
            self.config.ranker.rank_refresh_s,
            PageRankParams {
                damping: self.config.ranker.damping,
                iterations: self.config.ranker.pagerank_iters,
            },
            shutdown.clone(),
        ));

        // The crawl task can also end on its own, before any shutdown signal,
        // if repeated store failures cross the abort threshold (§7 item 4).
        // `crawl_task` is only ever awaited to completion once, on whichever
        // branch observes it finishing first.
        let store_aborted = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown requested, draining up to {:?}", SHUTDOWN_GRACE);
                matches!(tokio::time::timeout(SHUTDOWN_GRACE, &mut crawl_task).await, Ok(Ok(true)))
            }
            res = &mut crawl_task => res.unwrap_or(false),
        };

        if store_aborted {
            tracing::error!("aborting: store failure threshold exceeded");
        }
        shutdown.trigger();

        let _ = tokio::time::timeout(SHUTDOWN_GRACE, refresh_task).await;

        tracing::info!("scheduler stopped");
        if store_aborted {
            return Err(crate::EngineError::Invariant(
                "store failure threshold exceeded, aborting".to_string(),
            ));
        }
        Ok(())
    }

    /// Convenience for `query`/`repl` CLI commands: builds one fresh snapshot
    /// synchronously rather than waiting on the periodic refresh.
    pub fn build_snapshot_now(&self) -> RankerSnapshot {
        build_snapshot_from_store(
            &self.store,
            PageRankParams {
                damping: self.config.ranker.damping,
                iterations: self.config.ranker.pagerank_iters,
            },
        )
    }
}

async fn refresh_loop(
    store: Arc<Store>,
    tx: watch::Sender<Arc<RankerSnapshot>>,
    interval_s: u64,
    params: PageRankParams,
    shutdown: ShutdownSignal,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_s.max(1)));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = build_snapshot_from_store(&store, params);
                tracing::info!(
                    corpus_size = snapshot.corpus_size,
                    "ranker snapshot refreshed"
                );
                let _ = tx.send(Arc::new(snapshot));
            }
            _ = shutdown.cancelled() => {
                tracing::debug!("ranker refresh loop stopping");
                break;
            }
        }
    }
}

fn build_snapshot_from_store(store: &Store, params: PageRankParams) -> RankerSnapshot {
    let doc_ids: Vec<_> = store
        .docs
        .iter_all()
        .map(|records| records.iter().map(|r| r.id).collect())
        .unwrap_or_default();

    build_snapshot(&doc_ids, &store.index, &store.graph, params)
}

/// Installs a Ctrl-C handler that triggers `shutdown` on the first signal.
pub fn install_ctrl_c_handler(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received interrupt, shutting down");
            shutdown.trigger();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_cancelled_resolves_after_trigger() {
        let shutdown = ShutdownSignal::new();
        assert!(!shutdown.is_triggered());

        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancelled() should resolve promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_signal_cancelled_returns_immediately_if_already_triggered() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(50), shutdown.cancelled())
            .await
            .expect("already-triggered cancelled() must not block");
    }
}
