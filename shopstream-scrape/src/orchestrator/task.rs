//! Per-storefront scrape task: one crawl run under a wall-clock budget.

use crate::crawl::CrawlRun;
use crate::crawler::PageFetcher;
use crate::types::{BatchedPage, Store};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;

/// How one storefront's task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOutcome {
    /// The storefront.
    pub store: Store,
    /// Batches forwarded to the merged output.
    pub batches: usize,
    /// Products in those batches.
    pub products: usize,
    /// Whether the wall-clock budget ran out first.
    pub timed_out: bool,
    /// Whether the merged output's consumer went away.
    pub consumer_gone: bool,
}

/// Run `run` on its own task and forward its batches to `out` until it
/// finishes or `budget` elapses.
///
/// On timeout the crawl task is aborted; batches already forwarded stand.
pub async fn scrape_source<F: PageFetcher + 'static>(
    run: CrawlRun<F>,
    budget: Duration,
    out: mpsc::Sender<BatchedPage>,
) -> SourceOutcome {
    let store = run.store();
    let deadline = Instant::now() + budget;
    let (tx, mut rx) = mpsc::channel(1);
    let crawl = AbortOnDropHandle::new(tokio::spawn(run.execute(tx)));

    let mut batches = 0;
    let mut products = 0;
    let mut consumer_gone = false;

    let forward = async {
        while let Some(batch) = rx.recv().await {
            let size = batch.len();
            if out.send(batch).await.is_err() {
                consumer_gone = true;
                break;
            }
            batches += 1;
            products += size;
        }
    };
    let timed_out = tokio::time::timeout_at(deadline, forward).await.is_err();

    if timed_out {
        tracing::warn!(%store, budget_secs = budget.as_secs_f64(), batches, "storefront timed out");
    }
    drop(crawl);

    SourceOutcome {
        store,
        batches,
        products,
        timed_out,
        consumer_gone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ExtractedItem, ExtractedPage, PageContext, StoreAdapter};
    use crate::config::ScrapeConfig;
    use crate::error::ScrapeError;
    use crate::sampling::SamplingPolicy;
    use crate::types::{Product, ScrapeRequest};
    use std::sync::Arc;

    /// Every page holds `per_page` products and links to the next page.
    struct EndlessAdapter {
        per_page: usize,
    }

    impl StoreAdapter for EndlessAdapter {
        fn store(&self) -> Store {
            Store::Amazon
        }

        fn search_url(&self, _query: &str, page: u32) -> String {
            format!("mock://endless/{page}")
        }

        fn extract(&self, _html: &str, ctx: &PageContext<'_>) -> Result<ExtractedPage, ScrapeError> {
            let items = (0..self.per_page)
                .map(|i| {
                    ExtractedItem::Ready(Product {
                        name: format!("p{}-{i}", ctx.page),
                        price: "1".into(),
                        ..Product::new(Store::Amazon)
                    })
                })
                .collect();
            Ok(ExtractedPage {
                items,
                next_page: Some(self.search_url(ctx.query, ctx.page + 1)),
            })
        }
    }

    /// Answers every URL, waiting `delay` first.
    struct SlowFetcher {
        delay: Duration,
    }

    impl PageFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, ScrapeError> {
            tokio::time::sleep(self.delay).await;
            Ok(String::new())
        }
    }

    /// One page: ten ready products, then ten with lazy images.
    struct LazyImageAdapter;

    impl StoreAdapter for LazyImageAdapter {
        fn store(&self) -> Store {
            Store::MercadoLibre
        }

        fn search_url(&self, _query: &str, page: u32) -> String {
            format!("mock://lazy/{page}")
        }

        fn extract(&self, _html: &str, _ctx: &PageContext<'_>) -> Result<ExtractedPage, ScrapeError> {
            let product = |i: usize, picture: &str| Product {
                name: format!("listing {i}"),
                price: "1".into(),
                picture: picture.into(),
                ..Product::new(Store::MercadoLibre)
            };
            let ready = (0..10).map(|i| ExtractedItem::Ready(product(i, "https://img.test/r.jpg")));
            let lazy = (10..20).map(|i| ExtractedItem::NeedsImage {
                product: product(i, "data:image/gif;base64,R0lGOD"),
                detail_url: format!("mock://detail/{i}"),
            });
            Ok(ExtractedPage {
                items: ready.chain(lazy).collect(),
                next_page: None,
            })
        }

        fn extract_enriched_image(&self, html: &str) -> Option<String> {
            Some(html.to_string())
        }
    }

    /// Serves search pages at once and detail pages after `detail_delay`.
    struct SlowDetailFetcher {
        detail_delay: Duration,
    }

    impl PageFetcher for SlowDetailFetcher {
        async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
            if url.starts_with("mock://detail/") {
                tokio::time::sleep(self.detail_delay).await;
                return Ok("https://img.test/full.jpg".into());
            }
            Ok(String::new())
        }
    }

    fn run(per_page: usize, delay: Duration, max_pages: u32) -> CrawlRun<SlowFetcher> {
        let request = ScrapeRequest {
            max_pages,
            ..ScrapeRequest::new("q")
        };
        CrawlRun::new(
            Arc::new(EndlessAdapter { per_page }),
            Arc::new(SlowFetcher { delay }),
            &request,
            &ScrapeConfig::default(),
            SamplingPolicy::seeded(10, 3),
        )
    }

    #[tokio::test]
    async fn forwards_every_batch_before_budget() {
        let (tx, mut rx) = mpsc::channel(8);
        let outcome = scrape_source(run(10, Duration::ZERO, 3), Duration::from_secs(5), tx).await;

        assert!(!outcome.timed_out);
        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.products, 30);
        assert_eq!(outcome.store, Store::Amazon);

        let mut received = 0;
        while let Some(batch) = rx.recv().await {
            received += batch.len();
        }
        assert_eq!(received, 30);
    }

    #[tokio::test]
    async fn budget_cuts_off_slow_storefront() {
        let (tx, mut rx) = mpsc::channel(8);
        let outcome = scrape_source(
            run(10, Duration::from_millis(300), 100),
            Duration::from_millis(1_000),
            tx,
        )
        .await;

        assert!(outcome.timed_out);
        assert!(outcome.batches >= 1, "batches before the deadline stand");
        assert!(outcome.batches < 100);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, outcome.batches);
    }

    #[tokio::test]
    async fn ready_products_forwarded_while_enrichment_outlives_budget() {
        let request = ScrapeRequest {
            sampling_rate: 1,
            ..ScrapeRequest::new("q")
        };
        let run = CrawlRun::new(
            Arc::new(LazyImageAdapter),
            Arc::new(SlowDetailFetcher {
                detail_delay: Duration::from_secs(3),
            }),
            &request,
            &ScrapeConfig::default(),
            SamplingPolicy::seeded(1, 9),
        );

        let (tx, mut rx) = mpsc::channel(8);
        let outcome = scrape_source(run, Duration::from_secs(1), tx).await;

        assert!(outcome.timed_out);
        assert_eq!(outcome.batches, 1);
        assert_eq!(outcome.products, 10);
        let batch = rx.recv().await.expect("ready batch forwarded");
        assert!(batch.iter().all(|p| !p.has_placeholder_picture()));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_when_consumer_leaves() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outcome = scrape_source(run(10, Duration::ZERO, 5), Duration::from_secs(5), tx).await;
        assert!(outcome.consumer_gone);
        assert_eq!(outcome.batches, 0);
    }
}
