//! Deduplicating batch accumulator.
//!
//! Owned by a single crawl driver; products reach it only after validation,
//! sampling and enrichment. It groups them into fixed-size batches and
//! remembers every key it has accepted so a product is emitted at most once
//! per storefront run, re-fetches included.

use crate::types::{BatchedPage, Product};
use std::collections::HashSet;

/// Collects products into batches of a fixed size.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    pending: Vec<Product>,
    seen: HashSet<(String, String)>,
    emitted: usize,
}

impl BatchAccumulator {
    /// Create an accumulator flushing every `batch_size` products.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            pending: Vec::with_capacity(batch_size),
            seen: HashSet::new(),
            emitted: 0,
        }
    }

    /// Dedup key: the store plus the name, or the link when the name is blank.
    fn key(product: &Product) -> (String, String) {
        let name = product.name.trim();
        let id = if name.is_empty() {
            product.product_link.trim()
        } else {
            name
        };
        (product.store.clone(), id.to_owned())
    }

    /// Offer a product. Returns `false` if an equal product was seen before.
    pub fn push(&mut self, product: Product) -> bool {
        if !self.seen.insert(Self::key(&product)) {
            tracing::debug!(store = %product.store, name = %product.name, "duplicate product dropped");
            return false;
        }
        self.pending.push(product);
        true
    }

    /// Total products handed out in batches so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Take one full batch, if enough products are pending.
    pub fn take_full(&mut self) -> Option<BatchedPage> {
        if self.pending.len() < self.batch_size {
            return None;
        }
        let rest = self.pending.split_off(self.batch_size);
        let batch = std::mem::replace(&mut self.pending, rest);
        self.emitted += batch.len();
        Some(batch)
    }

    /// Take whatever is left. Never returns an empty batch.
    pub fn finish(&mut self) -> Option<BatchedPage> {
        if self.pending.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.pending);
        self.emitted += batch.len();
        Some(batch)
    }
}
