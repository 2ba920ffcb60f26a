//! # shopstream-scrape
//!
//! Concurrent product scraping across online storefronts, streamed in
//! batches as results are found.
//!
//! This crate scrapes public search pages of AliExpress, Amazon, Alibaba and
//! MercadoLibre directly, normalises listings into [`Product`] records and
//! hands them out as [`BatchedPage`]s through a single merged stream.
//!
//! ## Design
//!
//! - One independent crawl per storefront, each with its own HTTP client,
//!   rate limit and wall-clock budget
//! - Batches of ten products flushed as soon as they fill, remainder at the end
//! - Low-yield pages re-fetched once per budget unit and merged through dedup
//! - Lazy-loaded images resolved from product pages, sampled at a
//!   caller-chosen rate to trade completeness for speed
//! - Graceful degradation: a failing or slow storefront only loses its own
//!   results
//!
//! ## Security
//!
//! - No API keys or secrets
//! - No network listeners; the HTTP surface lives in the `shopstream` service
//! - Search queries and URLs are logged only at trace level

pub mod adapter;
pub mod batch;
pub mod config;
pub mod crawl;
pub mod crawler;
pub mod enrichment;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod pagination;
pub mod price;
pub mod sampling;
pub mod stores;
pub mod types;

pub use adapter::StoreAdapter;
pub use config::ScrapeConfig;
pub use crawler::{Collector, LimitRule, PageFetcher};
pub use error::{Result, ScrapeError};
pub use orchestrator::Orchestrator;
pub use types::{BatchedPage, Product, ScrapeRequest, Store};

use futures::Stream;

/// Scrape every storefront named in `request` concurrently.
///
/// Convenience wrapper around [`Orchestrator::new`] and
/// [`Orchestrator::run`]. Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`ScrapeError::Config`] if `config` or `request` is invalid.
/// Storefront failures never surface here; they only shorten the stream.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> shopstream_scrape::Result<()> {
/// use futures::StreamExt;
///
/// let request = shopstream_scrape::ScrapeRequest::new("watch wood");
/// let mut batches =
///     shopstream_scrape::scrape(request, shopstream_scrape::ScrapeConfig::default())?;
/// while let Some(batch) = batches.next().await {
///     for product in &batch {
///         println!("{} [{}]: {}", product.name, product.store, product.price);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn scrape(
    request: ScrapeRequest,
    config: ScrapeConfig,
) -> Result<impl Stream<Item = BatchedPage> + Send + 'static> {
    Orchestrator::new(config)?.run(request)
}
