//! Error types for the shopstream-scrape crate.
//!
//! Scraping-layer errors are contained inside each source's run: they are
//! logged and degrade to missing data. Only configuration and request
//! validation errors ever reach a caller.

/// Errors that can occur while scraping storefronts.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// An HTTP request to a storefront failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A storefront response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid scrape configuration or request parameters.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for shopstream-scrape results.
pub type Result<T> = std::result::Result<T, ScrapeError>;
