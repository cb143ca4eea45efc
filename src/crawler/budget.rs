//! Page budget discovery
//!
//! The budget is computed once per run from the source's entry page and is
//! never persisted. Any failure degrades to a single page so the walk still
//! makes progress.

use crate::crawler::PageSession;
use crate::source::{BudgetSignal, Source};
use tracing::{info, warn};

/// Turns a source's pagination evidence into a page count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBudgetEstimator {
    page_size: u32,
    max_pages: Option<u32>,
}

impl PageBudgetEstimator {
    /// Creates an estimator
    ///
    /// # Arguments
    ///
    /// * `page_size` - Items per listing page, for total-count signals
    /// * `max_pages` - Optional upper bound on the result
    pub fn new(page_size: u32, max_pages: Option<u32>) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages,
        }
    }

    /// Discovers the budget for `source`; always returns at least 1
    pub async fn estimate(&self, source: &dyn Source, session: &mut dyn PageSession) -> u32 {
        let signal = match source.discover_budget(session).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(source = %source.label(), "Could not load discovery page, walking 1 page: {}", e);
                return self.clamp(1);
            }
        };

        let max_page = self.resolve(signal);
        info!(source = %source.label(), ?signal, "Page budget: {}", max_page);
        max_page
    }

    /// Maps a signal to a page count without any I/O
    pub fn resolve(&self, signal: BudgetSignal) -> u32 {
        let pages = match signal {
            BudgetSignal::HighestPage(n) | BudgetSignal::Fixed(n) if n > 0 => n,
            BudgetSignal::TotalItems(total) if total > 0 => {
                let pages = total.div_ceil(u64::from(self.page_size));
                u32::try_from(pages).unwrap_or(u32::MAX)
            }
            _ => {
                warn!(?signal, "No usable pagination signal, walking 1 page");
                1
            }
        };
        self.clamp(pages)
    }

    fn clamp(&self, pages: u32) -> u32 {
        match self.max_pages {
            Some(cap) => pages.min(cap).max(1),
            None => pages.max(1),
        }
    }
}
