//! Fetcher: a single HTTP GET through a SOCKS5 proxy, with retry/backoff.
//!
//! All traffic is routed through the configured SOCKS5 endpoint in `socks5h`
//! mode, so hidden-service hostnames are resolved by the proxy, never
//! locally.

use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection failed for {url}: {message}")]
    ConnectionError { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to decode response body for {url}: {message}")]
    DecodeError { url: String, message: String },
}

impl FetchError {
    /// Transient transport errors are retried; permanent ones are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::ConnectionError { .. } | FetchError::Timeout { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            FetchError::DecodeError { .. } => false,
        }
    }
}

/// The outcome of a successful fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub final_url: String,
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// `min(300s, 5s * 2^attempt)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self
            .base_delay
            .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX).max(1))
            .unwrap_or(self.max_delay);
        scaled.min(self.max_delay)
    }
}

/// Builds an HTTP client routed through the given SOCKS5 endpoint.
///
/// `socks_endpoint` is `host:port`; the proxy scheme is `socks5h` so DNS
/// resolution happens at the proxy, not on this host.
pub fn build_http_client(
    socks_endpoint: &str,
    user_agent: &str,
    timeout: Duration,
    connection_pool_size: usize,
) -> Result<Client, reqwest::Error> {
    let proxy = reqwest::Proxy::all(format!("socks5h://{}", socks_endpoint))?;

    Client::builder()
        .proxy(proxy)
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .redirect(Policy::none()) // redirects are followed manually, capped, loop-checked
        .pool_max_idle_per_host(connection_pool_size)
        .gzip(true)
        .brotli(true)
        .build()
}

const MAX_REDIRECTS: u32 = 10;

/// Performs one fetch attempt, following redirects manually up to
/// `MAX_REDIRECTS` hops, and refusing to read bodies over `max_body_bytes`.
pub async fn fetch_url(
    client: &Client,
    url: &str,
    max_body_bytes: u64,
) -> Result<FetchOutcome, FetchError> {
    fetch_with_redirects(client, url, max_body_bytes, &mut Vec::new()).await
}

async fn fetch_with_redirects(
    client: &Client,
    url: &str,
    max_body_bytes: u64,
    visited: &mut Vec<String>,
) -> Result<FetchOutcome, FetchError> {
    if visited.iter().any(|v| v == url) {
        return Err(FetchError::ConnectionError {
            url: url.to_string(),
            message: "redirect loop detected".to_string(),
        });
    }
    visited.push(url.to_string());
    if visited.len() as u32 > MAX_REDIRECTS {
        return Err(FetchError::ConnectionError {
            url: url.to_string(),
            message: format!("too many redirects (max {})", MAX_REDIRECTS),
        });
    }

    let started = std::time::Instant::now();
    let response = client.get(url).send().await.map_err(|e| classify_reqwest_error(url, e))?;

    let status = response.status();

    if status.is_redirection() {
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| FetchError::ConnectionError {
                url: url.to_string(),
                message: "redirect without Location header".to_string(),
            })?;

        let base = url::Url::parse(url).map_err(|e| FetchError::ConnectionError {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let next = base.join(location).map_err(|e| FetchError::ConnectionError {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        return Box::pin(fetch_with_redirects(client, next.as_str(), max_body_bytes, visited))
            .await;
    }

    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if let Some(len) = response.content_length() {
        if len > max_body_bytes {
            return Err(FetchError::DecodeError {
                url: url.to_string(),
                message: format!("body size {} exceeds cap {}", len, max_body_bytes),
            });
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::DecodeError {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if bytes.len() as u64 > max_body_bytes {
        return Err(FetchError::DecodeError {
            url: url.to_string(),
            message: format!("body size {} exceeds cap {}", bytes.len(), max_body_bytes),
        });
    }

    Ok(FetchOutcome {
        final_url,
        status: status.as_u16(),
        content_type,
        body: bytes.to_vec(),
        response_time_ms: started.elapsed().as_millis() as u64,
    })
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else if let Some(status) = e.status() {
        FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::ConnectionError {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Fetches with retry: transient errors are retried up to `policy.max_retries`
/// times with capped exponential backoff; permanent errors return immediately.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    max_body_bytes: u64,
    policy: &RetryPolicy,
) -> Result<FetchOutcome, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_url(client, url, max_body_bytes).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!("retry {} for {} after {:?}: {}", attempt + 1, url, delay, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
