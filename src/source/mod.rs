//! Listing sources
//!
//! A `Source` knows how one site lays out its listing and detail pages. The
//! walker and the detail pipeline only ever talk to this trait.

mod selector;

pub use selector::SelectorSource;

use crate::crawler::{FetchError, PageSession};
use crate::output::DetailRecord;
use crate::state::CandidateLink;
use async_trait::async_trait;

/// Page-count evidence found on a source's discovery page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetSignal {
    /// Highest page number shown by the pagination control
    HighestPage(u32),

    /// Total number of items in the listing
    TotalItems(u64),

    /// Page count taken from configuration
    Fixed(u32),

    /// Nothing usable was found
    Unknown,
}

/// Site-specific listing and detail extraction
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    fn category(&self) -> Option<&str> {
        None
    }

    /// Name of the identifier history this source reads and grows
    fn dedup_scope(&self) -> &str;

    /// Field columns of the detail records, in order
    fn columns(&self) -> Vec<String>;

    /// `name` or `name/category`
    fn label(&self) -> String {
        match self.category() {
            Some(category) => format!("{}/{}", self.name(), category),
            None => self.name().to_string(),
        }
    }

    /// Inspects the entry page for pagination evidence
    async fn discover_budget(
        &self,
        session: &mut dyn PageSession,
    ) -> Result<BudgetSignal, FetchError>;

    /// Loads listing page `page` (1-based) and returns its cards in page order
    ///
    /// Cards without a derivable identifier are left out.
    async fn list_page(
        &self,
        session: &mut dyn PageSession,
        page: u32,
    ) -> Result<Vec<CandidateLink>, FetchError>;

    /// Loads a detail page and extracts its fields
    ///
    /// Fields that cannot be found are left empty rather than failing.
    async fn fetch_detail(
        &self,
        session: &mut dyn PageSession,
        candidate: &CandidateLink,
    ) -> Result<DetailRecord, FetchError>;
}
