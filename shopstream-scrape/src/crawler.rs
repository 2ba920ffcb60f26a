//! Page fetching with per-source rate limits and bounded retry.
//!
//! Every storefront run owns one [`Collector`]: its own HTTP client, its own
//! concurrency limit and its own request pacing, so a slow or throttled
//! storefront never holds back another one. Fetches go through the
//! [`PageFetcher`] trait so the crawl driver can be exercised without a
//! network.

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::http;
use crate::types::Store;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Request pacing for one storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitRule {
    /// Maximum concurrent requests (page visits plus enrichment fetches).
    pub parallelism: usize,
    /// Fixed wait before every request.
    pub delay: Duration,
    /// Upper bound of an extra random wait added to `delay`.
    pub random_delay: Duration,
}

impl Default for LimitRule {
    fn default() -> Self {
        Self {
            parallelism: 1,
            delay: Duration::from_secs(1),
            random_delay: Duration::from_millis(500),
        }
    }
}

impl LimitRule {
    /// A rule with no waiting, for local mock servers.
    pub fn unthrottled() -> Self {
        Self {
            parallelism: 8,
            delay: Duration::ZERO,
            random_delay: Duration::ZERO,
        }
    }

    fn pause(&self) -> Duration {
        let max_jitter = self.random_delay.as_millis() as u64;
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=max_jitter)
        };
        self.delay + Duration::from_millis(jitter)
    }
}

/// Attempt counter for a single URL.
///
/// Created fresh by the fetch loop for each URL and dropped with it, so
/// counts never leak between URLs, storefronts or requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
}

impl RetryState {
    /// Start counting for a URL that may be tried `max_attempts` times.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Record a failed attempt. Returns `true` if another attempt is allowed.
    pub fn record_failure(&mut self) -> bool {
        self.attempts += 1;
        self.attempts < self.max_attempts
    }

    /// Number of failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Something that can load a page body by URL.
///
/// All implementations must be `Send + Sync`: a fetcher is shared between a
/// storefront's page loop and its enrichment sub-tasks.
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] once the page cannot be loaded, after
    /// whatever retrying the implementation does.
    fn fetch(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<String, ScrapeError>> + Send;
}

/// Rate-limited, retrying page fetcher for one storefront.
pub struct Collector {
    store: Store,
    client: reqwest::Client,
    rule: LimitRule,
    permits: Semaphore,
    max_attempts: u32,
}

impl Collector {
    /// Build a collector for `store` that paces requests by `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the HTTP client cannot be constructed.
    pub fn new(store: Store, rule: LimitRule, config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            store,
            client: http::build_client(store, config)?,
            rule,
            permits: Semaphore::new(rule.parallelism.max(1)),
            max_attempts: config.max_fetch_attempts,
        })
    }

    /// The rate limit this collector applies.
    pub fn rule(&self) -> LimitRule {
        self.rule
    }

    async fn fetch_once(&self, url: &str) -> Result<String, ScrapeError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ScrapeError::Http(format!("{} limiter closed: {e}", self.store)))?;

        let pause = self.rule.pause();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        tracing::trace!(store = %self.store, url, "visiting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Http(format!("{} request failed: {e}", self.store)))?
            .error_for_status()
            .map_err(|e| ScrapeError::Http(format!("{} HTTP error: {e}", self.store)))?;

        response
            .text()
            .await
            .map_err(|e| ScrapeError::Http(format!("{} response read failed: {e}", self.store)))
    }
}

impl PageFetcher for Collector {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let mut retry = RetryState::new(self.max_attempts);
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    tracing::trace!(store = %self.store, bytes = body.len(), "page received");
                    return Ok(body);
                }
                Err(err) => {
                    let again = retry.record_failure();
                    tracing::warn!(
                        store = %self.store,
                        url,
                        attempt = retry.attempts(),
                        error = %err,
                        "page fetch failed"
                    );
                    if !again {
                        return Err(ScrapeError::Http(format!(
                            "gave up on {url} after {} attempts: {err}",
                            retry.attempts()
                        )));
                    }
                }
            }
        }
    }
}
