//! Pagination decisions for one storefront run.
//!
//! After every visited page the controller picks one of three moves: re-fetch
//! the page because it yielded too little, advance to the next page, or stop.
//! A re-fetch is only offered to top-level runs and only while the
//! storefront's re-fetch budget lasts, so nested runs can never recurse.
//!
//! The controller does not track what was already flushed: a re-fetched page
//! repeats products the driver has seen, and the run's dedup set in
//! [`crate::batch::BatchAccumulator`] keeps them from being emitted twice.

/// Where a storefront run stands after its latest page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    /// Visit the next page.
    Advancing,
    /// Run a nested one-page scrape of the current page and merge it.
    RefetchingLowYield,
    /// No further pages. Terminal.
    Exhausted,
}

/// Tracks page numbers, visits and re-fetch budget for one run.
#[derive(Debug, Clone)]
pub struct PaginationController {
    page: u32,
    pages_visited: u32,
    max_pages: u32,
    refetches_used: u32,
    refetch_budget: u32,
    low_yield_threshold: usize,
    allow_refetch: bool,
    state: PaginationState,
}

impl PaginationController {
    /// Start at `start_page` and visit at most `max_pages` pages.
    ///
    /// `allow_refetch` is `false` for nested runs.
    pub fn new(
        start_page: u32,
        max_pages: u32,
        refetch_budget: u32,
        low_yield_threshold: usize,
        allow_refetch: bool,
    ) -> Self {
        Self {
            page: start_page.max(1),
            pages_visited: 0,
            max_pages,
            refetches_used: 0,
            refetch_budget,
            low_yield_threshold,
            allow_refetch,
            state: PaginationState::Advancing,
        }
    }

    /// Logical number of the current page.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Pages visited so far, not counting re-fetches.
    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    /// Re-fetches spent so far.
    pub fn refetches_used(&self) -> u32 {
        self.refetches_used
    }

    /// Decide the next move after visiting the current page.
    ///
    /// `yielded` counts the new products the page contributed and
    /// `has_next` reports whether the storefront linked a following page.
    /// Choosing a re-fetch is safe even when the page already flushed a
    /// batch, because the driver merges the re-fetch through its dedup set.
    pub fn after_page(&mut self, yielded: usize, has_next: bool) -> PaginationState {
        if self.state == PaginationState::Exhausted {
            return self.state;
        }
        self.pages_visited += 1;

        let low_yield = yielded < self.low_yield_threshold;
        if has_next && low_yield && self.allow_refetch && self.refetches_used < self.refetch_budget
        {
            self.refetches_used += 1;
            self.state = PaginationState::RefetchingLowYield;
            return self.state;
        }

        self.advance_or_stop(has_next)
    }

    /// Decide the next move once a re-fetch of the current page completed.
    pub fn after_refetch(&mut self, has_next: bool) -> PaginationState {
        if self.state != PaginationState::RefetchingLowYield {
            return self.state;
        }
        self.advance_or_stop(has_next)
    }

    fn advance_or_stop(&mut self, has_next: bool) -> PaginationState {
        if has_next && self.pages_visited < self.max_pages {
            self.page += 1;
            self.state = PaginationState::Advancing;
        } else {
            self.state = PaginationState::Exhausted;
        }
        self.state
    }
}
