// src/fetch/mod.rs

//! Rate-limited, retried HTTP fetching with conditional-request caching.
//!
//! The fetcher owns all process-wide fetch state: the per-host rate
//! limiter, the in-flight permit pool and the URL validator cache.
//! Constructing one per pipeline keeps independent pipelines (and tests)
//! from cross-contaminating.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::StatusCode;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, RETRY_AFTER};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, FetchError, Result};
use crate::models::{Config, FetchOutcome, PageFetchResult};
use crate::utils::get_host;

type HostLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const BASE_BACKOFF_MS: u64 = 1_000;
const MAX_RETRY_AFTER_SECS: u64 = 120;

/// Validators remembered for a URL after a 200 response.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Seam between the paginator/pipeline and the network.
///
/// The production implementation is [`Fetcher`]; tests drive the same
/// call sites with an in-memory stub.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchOutcome>;
}

/// Outcome of one attempt, before retry policy is applied.
struct AttemptError {
    error: FetchError,
    retry_after: Option<Duration>,
}

impl AttemptError {
    fn new(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// HTTP fetcher with per-host pacing, bounded concurrency, retries and
/// an ETag/Last-Modified cache.
pub struct Fetcher {
    client: reqwest::Client,
    limiter: HostLimiter,
    permits: Semaphore,
    cache: Mutex<HashMap<String, CacheEntry>>,
    max_retries: u32,
}

impl Fetcher {
    /// Build a fetcher from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.http.user_agent)
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .map_err(|e| AppError::config(format!("failed to build HTTP client: {e}")))?;

        let period = Duration::from_secs(config.http.request_delay_secs);
        let quota = Quota::with_period(period)
            .ok_or_else(|| AppError::config("request_delay_secs must be > 0"))?
            .allow_burst(nonzero!(1u32));

        Ok(Self {
            client,
            limiter: RateLimiter::keyed(quota),
            permits: Semaphore::new(config.http.concurrent_jobs),
            cache: Mutex::new(HashMap::new()),
            max_retries: config.http.max_retries,
        })
    }

    /// Known validators for a URL, if any.
    pub fn cache_entry(&self, url: &str) -> Option<CacheEntry> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    fn remember_validators(&self, url: &str, entry: CacheEntry) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), entry);
    }

    async fn attempt(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchOutcome, AttemptError> {
        let timeout = |u: &str| FetchError::Timeout { url: u.to_string() };

        let mut request = self.client.get(url);
        if let Some(entry) = self.cache_entry(url) {
            if let Some(etag) = &entry.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(lm) = &entry.last_modified {
                request = request.header(IF_MODIFIED_SINCE, lm);
            }
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AttemptError::new(timeout(url))),
            r = request.send() => r.map_err(|e| AttemptError::new(classify_send_error(url, &e)))?,
        };

        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)));
            return Err(AttemptError {
                error: FetchError::RateLimited {
                    url: url.to_string(),
                },
                retry_after,
            });
        }

        if status.is_client_error() {
            return Err(AttemptError::new(FetchError::ClientError {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        if status.is_server_error() {
            return Err(AttemptError::new(FetchError::ServerError {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v: &reqwest::header::HeaderValue| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);
        let final_url = response.url().to_string();

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(AttemptError::new(timeout(url))),
            b = response.text() => b.map_err(|e| AttemptError::new(classify_send_error(url, &e)))?,
        };

        let fetched_at = Utc::now();
        self.remember_validators(
            url,
            CacheEntry {
                etag: etag.clone(),
                last_modified: last_modified.clone(),
                fetched_at: Some(fetched_at),
            },
        );

        Ok(FetchOutcome::Fetched(PageFetchResult {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
            etag,
            last_modified,
            fetched_at,
        }))
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchOutcome> {
        let timeout = || FetchError::Timeout {
            url: url.to_string(),
        };

        // In-flight cap: a bounded worker pool, no unbounded queuing.
        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Err(timeout().into()),
            p = self.permits.acquire() => p.map_err(|_| FetchError::Transport {
                url: url.to_string(),
                message: "fetch permit pool closed".into(),
            })?,
        };

        let host = get_host(url).unwrap_or_else(|| url.to_string());

        let mut attempt = 0u32;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(timeout().into()),
                _ = self.limiter.until_key_ready(&host) => {}
            }

            match self.attempt(url, cancel).await {
                Ok(outcome) => return Ok(outcome),
                Err(failed) if failed.error.is_transient() && attempt < self.max_retries => {
                    let delay = failed
                        .retry_after
                        .unwrap_or_else(|| backoff_delay(url, attempt));
                    log::warn!(
                        "Transient fetch failure for {} (attempt {}/{}): {}; retrying in {:.1}s",
                        url,
                        attempt + 1,
                        self.max_retries,
                        failed.error,
                        delay.as_secs_f64()
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(timeout().into()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(failed) => return Err(failed.error.into()),
            }
        }
    }
}

fn classify_send_error(url: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Exponential backoff with a deterministic per-URL jitter.
fn backoff_delay(url: &str, attempt: u32) -> Duration {
    let digest = Sha256::digest(url.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    let jitter_ms = u64::from_be_bytes(seed).wrapping_add(attempt as u64) % 400;
    Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt) + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_is_deterministic() {
        let url = "https://example.com/latest-jobs/";
        let d0 = backoff_delay(url, 0);
        let d1 = backoff_delay(url, 1);
        let d2 = backoff_delay(url, 2);

        assert!(d1 > d0);
        assert!(d2 > d1);
        assert_eq!(d0, backoff_delay(url, 0));
        assert!(d0 < Duration::from_millis(BASE_BACKOFF_MS + 400));
    }

    #[test]
    fn test_fetcher_builds_from_default_config() {
        let config = Config::default();
        let fetcher = Fetcher::new(&config).unwrap();
        assert!(fetcher.cache_entry("https://example.com/").is_none());
    }

    #[test]
    fn test_cache_entry_roundtrip() {
        let fetcher = Fetcher::new(&Config::default()).unwrap();
        fetcher.remember_validators(
            "https://example.com/latest-jobs/",
            CacheEntry {
                etag: Some("\"abc123\"".into()),
                last_modified: None,
                fetched_at: Some(Utc::now()),
            },
        );

        let entry = fetcher.cache_entry("https://example.com/latest-jobs/").unwrap();
        assert_eq!(entry.etag.as_deref(), Some("\"abc123\""));
        assert!(fetcher.cache_entry("https://example.com/other/").is_none());
    }
}
