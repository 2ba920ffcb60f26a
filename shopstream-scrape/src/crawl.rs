//! The generic crawl driver shared by every storefront.
//!
//! A [`CrawlRun`] walks one storefront's result pages sequentially. For each
//! page it asks the adapter for product candidates, runs sampling and image
//! enrichment, feeds the survivors through a [`BatchAccumulator`] and sends
//! full batches downstream. The accumulator is owned by the driver alone:
//! enrichment sub-tasks hand their products back through join handles.
//!
//! Products enter the accumulator in page order. A product waits only for
//! the enrichments of products before it on the page, so a batch is held
//! back only by enrichments of the products it contains.
//!
//! A low-yield page may be re-fetched once per budget unit. The re-fetch is a
//! nested one-page run with its own channel whose products are merged back
//! through the parent's dedup set as the nested run emits them.

use crate::adapter::{ExtractedItem, ExtractedPage, PageContext, StoreAdapter};
use crate::batch::BatchAccumulator;
use crate::config::ScrapeConfig;
use crate::crawler::PageFetcher;
use crate::enrichment::enrich_product;
use crate::pagination::{PaginationController, PaginationState};
use crate::sampling::{SampleDecision, SamplingPolicy};
use crate::types::{BatchedPage, Product, ScrapeRequest, Store};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Nesting depth of a re-fetch sub-run. Sub-runs never re-fetch.
const NESTED_DEPTH: u8 = 1;

/// Enrichment sub-tasks of one page, each tagged with its page position.
type EnrichmentSet = JoinSet<(usize, Option<Product>)>;

/// One position on a search page.
enum Slot {
    /// Decided: the admitted product, or `None` if it was dropped.
    Settled(Option<Product>),
    /// Waiting on its enrichment sub-task.
    Pending,
}

/// One storefront's walk over its result pages.
pub struct CrawlRun<F> {
    store: Store,
    adapter: Arc<dyn StoreAdapter>,
    fetcher: Arc<F>,
    query: String,
    first_url: String,
    start_page: u32,
    max_pages: u32,
    strict: bool,
    depth: u8,
    batch_size: usize,
    low_yield_threshold: usize,
    sampling: SamplingPolicy,
}

impl<F: PageFetcher + 'static> CrawlRun<F> {
    /// Prepare a top-level run of `request` against `adapter`'s storefront.
    pub fn new(
        adapter: Arc<dyn StoreAdapter>,
        fetcher: Arc<F>,
        request: &ScrapeRequest,
        config: &ScrapeConfig,
        sampling: SamplingPolicy,
    ) -> Self {
        let first_url = adapter.search_url(&request.query, request.start_page);
        Self {
            store: adapter.store(),
            adapter,
            fetcher,
            query: request.query.clone(),
            first_url,
            start_page: request.start_page,
            max_pages: request.max_pages,
            strict: request.strict_search,
            depth: 0,
            batch_size: config.batch_size,
            low_yield_threshold: config.low_yield_threshold,
            sampling,
        }
    }

    /// A one-page run of `url` that never re-fetches.
    fn nested(&mut self, url: &str, page: u32) -> Self {
        Self {
            store: self.store,
            adapter: Arc::clone(&self.adapter),
            fetcher: Arc::clone(&self.fetcher),
            query: self.query.clone(),
            first_url: url.to_owned(),
            start_page: page,
            max_pages: 1,
            strict: self.strict,
            depth: NESTED_DEPTH,
            batch_size: self.batch_size,
            low_yield_threshold: self.low_yield_threshold,
            sampling: self.sampling.fork(),
        }
    }

    /// The storefront this run scrapes.
    pub fn store(&self) -> Store {
        self.store
    }

    /// [`execute`](Self::execute) behind a boxed future, so a run can await
    /// a nested run of its own type.
    pub fn boxed_execute(self, tx: mpsc::Sender<BatchedPage>) -> BoxFuture<'static, ()> {
        Box::pin(self.execute(tx))
    }

    /// Walk the storefront's pages, sending batches on `tx`.
    ///
    /// Returns once pagination is exhausted (after flushing any remainder)
    /// or as soon as the receiver is gone. Dropping `tx` on return closes
    /// the run's channel.
    pub async fn execute(mut self, tx: mpsc::Sender<BatchedPage>) {
        let mut acc = BatchAccumulator::new(self.batch_size);
        let mut ctl = PaginationController::new(
            self.start_page,
            self.max_pages,
            self.adapter.refetch_budget(),
            self.low_yield_threshold,
            self.depth == 0,
        );
        let mut url = self.first_url.clone();

        tracing::debug!(store = %self.store, depth = self.depth, url = %url, "crawl started");

        loop {
            let page = self.visit(&url, ctl.page()).await;
            let next_page = page.next_page;

            let Some(yielded) = self.drain_page(page.items, &mut acc, &tx).await else {
                tracing::debug!(store = %self.store, "consumer gone, crawl stopped");
                return;
            };

            let mut state = ctl.after_page(yielded, next_page.is_some());
            if state == PaginationState::RefetchingLowYield {
                tracing::debug!(
                    store = %self.store,
                    page = ctl.page(),
                    yielded,
                    "low yield, re-fetching page"
                );
                let Some(merged) = self.refetch(&url, ctl.page(), &mut acc, &tx).await else {
                    return;
                };
                tracing::debug!(store = %self.store, merged, "re-fetch merged");
                state = ctl.after_refetch(next_page.is_some());
            }

            match (state, next_page) {
                (PaginationState::Advancing, Some(next)) => url = next,
                _ => break,
            }
        }

        if let Some(batch) = acc.finish() {
            Self::emit(self.store, &tx, batch).await;
        }
        tracing::debug!(
            store = %self.store,
            depth = self.depth,
            pages = ctl.pages_visited(),
            emitted = acc.emitted(),
            "crawl finished"
        );
    }

    /// Fetch and parse one page. Failures leave the page empty and without a
    /// next link, which ends pagination.
    async fn visit(&self, url: &str, page: u32) -> ExtractedPage {
        tracing::trace!(store = %self.store, url, page, query = %self.query, "visiting page");

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(store = %self.store, url, error = %err, "page unavailable");
                return ExtractedPage::default();
            }
        };

        let ctx = PageContext {
            url,
            query: &self.query,
            page,
        };
        match self.adapter.extract(&html, &ctx) {
            Ok(extracted) => extracted,
            Err(err) => {
                tracing::warn!(store = %self.store, url, error = %err, "page unreadable");
                ExtractedPage::default()
            }
        }
    }

    /// Feed one page's candidates into `acc` in page order.
    ///
    /// Every enrichment of the page starts at once. The driver then walks
    /// the page positions in order, waiting on a sub-task only when its
    /// position is next, so products ahead of it flush without delay.
    ///
    /// Returns how many products were new, or `None` if the receiver is gone.
    async fn drain_page(
        &mut self,
        items: Vec<ExtractedItem>,
        acc: &mut BatchAccumulator,
        tx: &mpsc::Sender<BatchedPage>,
    ) -> Option<usize> {
        let (mut slots, mut pending) = self.schedule(items);
        let mut accepted = 0;

        for index in 0..slots.len() {
            while matches!(slots.get(index), Some(Slot::Pending)) {
                let Some(joined) = pending.join_next().await else {
                    break;
                };
                match joined {
                    Ok((slot, product)) => {
                        let admitted = product.and_then(|p| self.admit(p));
                        if let Some(entry) = slots.get_mut(slot) {
                            *entry = Slot::Settled(admitted);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(store = %self.store, error = %err, "enrichment task failed");
                    }
                }
            }

            let settled = slots
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, Slot::Settled(None)));
            if let Some(Slot::Settled(Some(product))) = settled {
                if Self::accept(acc, tx, product).await? {
                    accepted += 1;
                }
            }
        }

        Some(accepted)
    }

    /// Decide every candidate of a page, spawning enrichment where sampled.
    fn schedule(&mut self, items: Vec<ExtractedItem>) -> (Vec<Slot>, EnrichmentSet) {
        let mut slots = Vec::with_capacity(items.len());
        let mut pending = JoinSet::new();

        for item in items {
            match item {
                ExtractedItem::Ready(product) => slots.push(Slot::Settled(self.admit(product))),
                ExtractedItem::NeedsImage {
                    product,
                    detail_url,
                } => {
                    if product.name.trim().is_empty() {
                        tracing::debug!(store = %self.store, detail_url = %detail_url, "nameless product dropped");
                        slots.push(Slot::Settled(None));
                        continue;
                    }
                    match self.sampling.decide(self.strict) {
                        SampleDecision::Enrich => {
                            let slot = slots.len();
                            slots.push(Slot::Pending);
                            let fetcher = Arc::clone(&self.fetcher);
                            let adapter = Arc::clone(&self.adapter);
                            let strict = self.strict;
                            pending.spawn(async move {
                                let product = enrich_product(
                                    fetcher.as_ref(),
                                    adapter.as_ref(),
                                    product,
                                    &detail_url,
                                    strict,
                                )
                                .await;
                                (slot, product)
                            });
                        }
                        SampleDecision::KeepPlaceholder => {
                            slots.push(Slot::Settled(self.admit(product)));
                        }
                        SampleDecision::Drop => {
                            tracing::debug!(store = %self.store, name = %product.name, "not sampled, dropped");
                            slots.push(Slot::Settled(None));
                        }
                    }
                }
            }
        }

        (slots, pending)
    }

    /// Validation and strict-search filtering.
    fn admit(&self, product: Product) -> Option<Product> {
        if !product.is_valid() {
            tracing::debug!(store = %self.store, link = %product.product_link, "invalid product dropped");
            return None;
        }
        if self.strict && (product.price.trim().is_empty() || product.has_placeholder_picture()) {
            tracing::debug!(store = %self.store, name = %product.name, "incomplete product dropped");
            return None;
        }
        Some(product)
    }

    /// Push one product through dedup, flushing a batch if it completes one.
    ///
    /// Returns whether the product was new, or `None` if the receiver is gone.
    async fn accept(
        acc: &mut BatchAccumulator,
        tx: &mpsc::Sender<BatchedPage>,
        product: Product,
    ) -> Option<bool> {
        let store = product.store.clone();
        let fresh = acc.push(product);
        if let Some(batch) = acc.take_full() {
            if !Self::emit_named(&store, tx, batch).await {
                return None;
            }
        }
        Some(fresh)
    }

    /// Run a nested one-page scrape of `url`, merging its products through
    /// `acc` as the nested run emits them.
    ///
    /// Returns how many products were new, or `None` if the receiver is gone.
    async fn refetch(
        &mut self,
        url: &str,
        page: u32,
        acc: &mut BatchAccumulator,
        tx: &mpsc::Sender<BatchedPage>,
    ) -> Option<usize> {
        let nested = self.nested(url, page);
        let (nested_tx, mut nested_rx) = mpsc::channel(1);
        let merge = async {
            let mut accepted: usize = 0;
            while let Some(batch) = nested_rx.recv().await {
                for product in batch {
                    if Self::accept(acc, tx, product).await? {
                        accepted += 1;
                    }
                }
            }
            Some(accepted)
        };
        let ((), merged) = tokio::join!(nested.boxed_execute(nested_tx), merge);
        merged
    }

    async fn emit(store: Store, tx: &mpsc::Sender<BatchedPage>, batch: BatchedPage) -> bool {
        Self::emit_named(store.name(), tx, batch).await
    }

    async fn emit_named(store: &str, tx: &mpsc::Sender<BatchedPage>, batch: BatchedPage) -> bool {
        let size = batch.len();
        let sent = tx.send(batch).await.is_ok();
        if sent {
            tracing::debug!(store, size, "batch flushed");
        }
        sent
    }
}

/// Run `request` against one storefront, sending batches on `tx`.
///
/// Convenience wrapper around [`CrawlRun::new`] and [`CrawlRun::execute`].
pub async fn run_adapter<F: PageFetcher + 'static>(
    adapter: Arc<dyn StoreAdapter>,
    fetcher: Arc<F>,
    request: &ScrapeRequest,
    config: &ScrapeConfig,
    sampling: SamplingPolicy,
    tx: mpsc::Sender<BatchedPage>,
) {
    CrawlRun::new(adapter, fetcher, request, config, sampling)
        .execute(tx)
        .await;
}
