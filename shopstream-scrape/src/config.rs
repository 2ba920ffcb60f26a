//! Scrape configuration with sensible defaults.
//!
//! [`ScrapeConfig`] controls per-source timeouts, batching, retry and
//! request behaviour. The defaults are tuned for polite scraping that still
//! streams a first batch quickly.

use crate::crawler::LimitRule;
use crate::error::ScrapeError;

/// Configuration shared by every scrape the orchestrator runs.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Wall-clock budget for one storefront, in seconds. When it runs out the
    /// storefront stops contributing; batches already forwarded stand.
    pub source_timeout_seconds: u64,
    /// Per-HTTP-request timeout in seconds.
    pub request_timeout_seconds: u64,
    /// Number of products per flushed batch.
    pub batch_size: usize,
    /// A page that yields fewer new products than this may be re-fetched.
    pub low_yield_threshold: usize,
    /// Attempts per URL before a page fetch is abandoned.
    pub max_fetch_attempts: u32,
    /// Capacity of the merged output channel. Bounds how many batches can
    /// wait for a slow consumer.
    pub output_capacity: usize,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Rate limit applied to every storefront instead of the storefront's
    /// own rule.
    pub limit_override: Option<LimitRule>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            source_timeout_seconds: 20,
            request_timeout_seconds: 10,
            batch_size: 10,
            low_yield_threshold: 5,
            max_fetch_attempts: 3,
            output_capacity: 16,
            user_agent: None,
            limit_override: None,
        }
    }
}

impl ScrapeConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Every timeout, size and attempt count must be greater than 0, and an
    /// override rate limit must allow at least one request at a time.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.source_timeout_seconds == 0 {
            return Err(ScrapeError::Config(
                "source_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ScrapeError::Config(
                "request_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ScrapeError::Config(
                "batch_size must be greater than 0".into(),
            ));
        }
        if self.max_fetch_attempts == 0 {
            return Err(ScrapeError::Config(
                "max_fetch_attempts must be greater than 0".into(),
            ));
        }
        if self.output_capacity == 0 {
            return Err(ScrapeError::Config(
                "output_capacity must be greater than 0".into(),
            ));
        }
        if let Some(rule) = &self.limit_override {
            if rule.parallelism == 0 {
                return Err(ScrapeError::Config(
                    "limit_override parallelism must be greater than 0".into(),
                ));
            }
        }
        Ok(())
    }
}
