//! Concurrent fan-out of storefront tasks into one bounded channel.

use super::task::{scrape_source, SourceOutcome};
use crate::crawl::CrawlRun;
use crate::crawler::PageFetcher;
use crate::types::BatchedPage;
use std::time::Duration;
use tokio::sync::mpsc;

/// Start one task per run and merge their batches.
///
/// The returned receiver yields batches interleaved across storefronts, in
/// order within each storefront, and closes once every task has finished.
/// Must be called from within a Tokio runtime.
pub fn spawn_sources<F: PageFetcher + 'static>(
    runs: Vec<CrawlRun<F>>,
    budget: Duration,
    capacity: usize,
) -> mpsc::Receiver<BatchedPage> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let tasks: Vec<_> = runs
        .into_iter()
        .map(|run| scrape_source(run, budget, tx.clone()))
        .collect();
    drop(tx);

    tokio::spawn(async move {
        let outcomes = futures::future::join_all(tasks).await;
        log_summary(&outcomes);
    });

    rx
}

fn log_summary(outcomes: &[SourceOutcome]) {
    for outcome in outcomes {
        tracing::debug!(
            store = %outcome.store,
            batches = outcome.batches,
            products = outcome.products,
            timed_out = outcome.timed_out,
            consumer_gone = outcome.consumer_gone,
            "storefront finished"
        );
    }
    let products: usize = outcomes.iter().map(|o| o.products).sum();
    tracing::debug!(sources = outcomes.len(), products, "scrape finished");
}
