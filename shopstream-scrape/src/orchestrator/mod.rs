//! Scrape orchestrator: concurrent storefront runs merged into one stream.
//!
//! This module fans a request out to every requested storefront, each with
//! its own collector, rate limit and wall-clock budget, and merges their
//! batches into a single bounded stream as soon as each batch exists.

pub mod fan_out;
pub mod task;

use crate::adapter::{default_adapter, StoreAdapter};
use crate::config::ScrapeConfig;
use crate::crawl::CrawlRun;
use crate::crawler::Collector;
use crate::error::ScrapeError;
use crate::sampling::SamplingPolicy;
use crate::types::{BatchedPage, ScrapeRequest, Store};
use futures::Stream;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

pub use task::SourceOutcome;

/// Runs scrape requests against a registry of storefront adapters.
///
/// Cheap to share behind an [`Arc`]; every [`run`](Self::run) builds its own
/// collectors and state, so concurrent requests never share anything mutable.
pub struct Orchestrator {
    config: ScrapeConfig,
    adapters: HashMap<Store, Arc<dyn StoreAdapter>>,
    sampling_seed: Option<u64>,
}

impl Orchestrator {
    /// Create an orchestrator with the production adapter for every store.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Config`] if `config` fails validation.
    pub fn new(config: ScrapeConfig) -> Result<Self, ScrapeError> {
        config.validate()?;
        let adapters = Store::all()
            .iter()
            .map(|store| (*store, default_adapter(*store)))
            .collect();
        Ok(Self {
            config,
            adapters,
            sampling_seed: None,
        })
    }

    /// Replace the adapter for the adapter's own store.
    pub fn with_adapter(mut self, adapter: Arc<dyn StoreAdapter>) -> Self {
        self.adapters.insert(adapter.store(), adapter);
        self
    }

    /// Make sampling decisions reproducible.
    pub fn with_sampling_seed(mut self, seed: u64) -> Self {
        self.sampling_seed = Some(seed);
        self
    }

    /// The configuration every run uses.
    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Start scraping `request` and return the merged batch stream.
    ///
    /// The stream yields each batch as soon as its storefront flushes it and
    /// ends once every storefront has finished or timed out. Dropping the
    /// stream stops the storefront tasks. Must be called from within a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Config`] if the request is out of range, or
    /// [`ScrapeError::Http`] if a storefront's HTTP client cannot be built.
    /// Nothing is fetched in either case.
    pub fn run(
        &self,
        request: ScrapeRequest,
    ) -> Result<impl Stream<Item = BatchedPage> + Send + 'static, ScrapeError> {
        request.validate()?;
        tracing::trace!(
            query = %request.query,
            stores = request.stores.len(),
            max_pages = request.max_pages,
            "scrape requested"
        );

        let mut runs = Vec::with_capacity(request.stores.len());
        for (index, store) in request.stores.iter().enumerate() {
            let Some(adapter) = self.adapters.get(store) else {
                tracing::warn!(%store, "no adapter registered, storefront skipped");
                continue;
            };
            let rule = self
                .config
                .limit_override
                .unwrap_or_else(|| adapter.limit_rule());
            let collector = Arc::new(Collector::new(*store, rule, &self.config)?);
            let sampling = match self.sampling_seed {
                Some(seed) => SamplingPolicy::seeded(request.sampling_rate, seed ^ index as u64),
                None => SamplingPolicy::from_entropy(request.sampling_rate),
            };
            runs.push(CrawlRun::new(
                Arc::clone(adapter),
                collector,
                &request,
                &self.config,
                sampling,
            ));
        }

        let rx = fan_out::spawn_sources(
            runs,
            Duration::from_secs(self.config.source_timeout_seconds),
            self.config.output_capacity,
        );
        Ok(ReceiverStream::new(rx))
    }
}
