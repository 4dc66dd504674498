use serde::Deserialize;

/// Top-level engine configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub proxy: ProxyConfig,
    pub ranker: RankerConfig,
    #[serde(rename = "url-policy", default)]
    pub url_policy: UrlPolicyConfig,
    pub storage: StorageConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Size of the bounded worker pool driving the crawl.
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Maximum retry attempts for a transient fetch failure.
    #[serde(rename = "retry-max", default = "default_retry_max")]
    pub retry_max: u32,

    /// Maximum Frontier depth; URLs deeper than this are never pushed.
    #[serde(rename = "depth-max", default = "default_depth_max")]
    pub depth_max: u32,

    /// Per-request fetch deadline, in seconds.
    #[serde(rename = "request-timeout-s", default = "default_timeout")]
    pub request_timeout_s: u64,

    /// Response bodies larger than this are not read.
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Size of the Fetcher's HTTP connection pool.
    #[serde(
        rename = "connection-pool-size",
        default = "default_connection_pool_size"
    )]
    pub connection_pool_size: usize,

    /// Consecutive durable-write failures before the Scheduler aborts
    /// (§7 taxonomy item 4).
    #[serde(
        rename = "store-failure-threshold",
        default = "default_store_failure_threshold"
    )]
    pub store_failure_threshold: u32,
}

/// SOCKS5 proxy and control-channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// SOCKS5 endpoint, `host:port`. All fetches are routed through this.
    #[serde(rename = "socks-endpoint", default = "default_socks_endpoint")]
    pub socks_endpoint: String,

    /// Control channel endpoint for `rotate_identity`, `host:port`.
    #[serde(rename = "control-endpoint")]
    pub control_endpoint: Option<String>,

    /// Authentication password for the control channel, if required.
    #[serde(rename = "control-password")]
    pub control_password: Option<String>,
}

/// Ranker refresh and algorithm parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RankerConfig {
    /// Seconds between automatic ranker-snapshot refreshes.
    #[serde(rename = "rank-refresh-s", default = "default_rank_refresh")]
    pub rank_refresh_s: u64,

    /// Maximum PageRank iterations per refresh.
    #[serde(rename = "pagerank-iters", default = "default_pagerank_iters")]
    pub pagerank_iters: u32,

    /// PageRank damping factor.
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Default number of results returned by a query.
    #[serde(rename = "top-k", default = "default_top_k")]
    pub top_k: usize,
}

/// Policy for which discovered URLs the Frontier will accept.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlPolicyConfig {
    /// Schemes that are allowed to be enqueued.
    #[serde(rename = "allowed-schemes", default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,

    /// Required suffix on the host part of the URL.
    #[serde(rename = "required-suffix", default = "default_required_suffix")]
    pub required_suffix: String,
}

impl Default for UrlPolicyConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: default_allowed_schemes(),
            required_suffix: default_required_suffix(),
        }
    }
}

/// On-disk storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database and any auxiliary files.
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: String,
}

/// User agent identification sent with every fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

fn default_workers() -> u32 {
    10
}
fn default_retry_max() -> u32 {
    5
}
fn default_depth_max() -> u32 {
    10
}
fn default_timeout() -> u64 {
    120
}
fn default_max_body_bytes() -> u64 {
    20 * 1024 * 1024
}
fn default_connection_pool_size() -> usize {
    100
}
fn default_store_failure_threshold() -> u32 {
    10
}
fn default_socks_endpoint() -> String {
    "127.0.0.1:9050".to_string()
}
fn default_rank_refresh() -> u64 {
    30
}
fn default_pagerank_iters() -> u32 {
    100
}
fn default_damping() -> f64 {
    0.85
}
fn default_top_k() -> usize {
    10
}
fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}
fn default_required_suffix() -> String {
    ".onion".to_string()
}
fn default_data_dir() -> String {
    "./data".to_string()
}
