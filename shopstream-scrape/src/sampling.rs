//! Probabilistic enrichment sampling.
//!
//! Resolving a lazy-loaded image costs one extra page fetch per product. A
//! request's sampling rate `r` trades completeness for speed: each product
//! that needs enrichment is enriched with probability `1/r`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// What to do with one product that needs enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    /// Fetch the product page and resolve the real value.
    Enrich,
    /// Skip the fetch and emit the product with its placeholder.
    KeepPlaceholder,
    /// Skip the fetch and drop the product (strict search).
    Drop,
}

/// Per-run sampling state with an injectable random source.
#[derive(Debug)]
pub struct SamplingPolicy {
    rate: u8,
    rng: StdRng,
}

impl SamplingPolicy {
    /// Sample at `rate` using `rng`. A rate of 0 is treated as 1.
    pub fn new(rate: u8, rng: StdRng) -> Self {
        Self {
            rate: rate.max(1),
            rng,
        }
    }

    /// Sample at `rate` with an OS-seeded random source.
    pub fn from_entropy(rate: u8) -> Self {
        Self::new(rate, StdRng::from_entropy())
    }

    /// Sample at `rate` with a reproducible random source.
    pub fn seeded(rate: u8, seed: u64) -> Self {
        Self::new(rate, StdRng::seed_from_u64(seed))
    }

    /// The configured sampling rate.
    pub fn rate(&self) -> u8 {
        self.rate
    }

    /// An independent policy with the same rate, seeded from this one.
    ///
    /// Used for nested runs so a seeded parent stays reproducible.
    pub fn fork(&mut self) -> Self {
        Self::seeded(self.rate, self.rng.gen())
    }

    /// Decide the fate of one product that needs enrichment.
    ///
    /// Draws uniformly from `1..=rate` and enriches only on `rate`.
    pub fn decide(&mut self, strict: bool) -> SampleDecision {
        let draw = self.rng.gen_range(1..=self.rate);
        if draw == self.rate {
            SampleDecision::Enrich
        } else if strict {
            SampleDecision::Drop
        } else {
            SampleDecision::KeepPlaceholder
        }
    }
}
