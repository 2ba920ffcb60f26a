//! Service configuration loaded from the environment.
//!
//! A `.env` file in the working directory is honoured for development.
//! `PORT` is required; everything else has a default.

use anyhow::{Context, Result};
use shopstream_scrape::ScrapeConfig;

/// Default bind host: every interface.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Configuration for the shopstream HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind. `0` lets the OS choose.
    pub port: u16,
    /// Scraping behaviour for every request.
    pub scrape: ScrapeConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment, after reading
    /// `.env` if present.
    ///
    /// # Errors
    ///
    /// Fails if `PORT` is missing or any variable is malformed.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// Recognised variables: `PORT` (required), `HOST`, and
    /// `SOURCE_TIMEOUT_SECONDS` (per-storefront budget).
    ///
    /// # Errors
    ///
    /// Fails if `PORT` is missing or any variable is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .context("PORT must be set")?
            .trim()
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let host = lookup("HOST")
            .map(|h| h.trim().to_owned())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());

        let mut scrape = ScrapeConfig::default();
        if let Some(raw) = lookup("SOURCE_TIMEOUT_SECONDS") {
            scrape.source_timeout_seconds = raw
                .trim()
                .parse::<u64>()
                .context("SOURCE_TIMEOUT_SECONDS must be a whole number of seconds")?;
        }
        scrape
            .validate()
            .context("invalid scrape configuration")?;

        Ok(Self { host, port, scrape })
    }

    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
