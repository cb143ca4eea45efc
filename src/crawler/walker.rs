//! Ordered walk over listing pages
//!
//! Pages are visited from 1 up to the budget. Each loaded page's cards are
//! filtered against the dedup store and against what this run already
//! accepted. The walk ends when the budget is used up, when the quota is
//! reached, or after too many loaded pages in a row with nothing new.

use crate::config::PauseRange;
use crate::crawler::quota::QuotaBoundedCollector;
use crate::crawler::PageSession;
use crate::source::Source;
use crate::state::{CandidateLink, Identifier, StopReason};
use crate::storage::DedupStore;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Walk tuning
#[derive(Debug, Clone, Copy)]
pub struct WalkSettings {
    /// Loaded pages in a row without a new candidate before stopping
    pub max_consecutive_empty_pages: u32,

    /// Pause between two listing page loads
    pub page_pause: PauseRange,
}

/// What a walk produced
#[derive(Debug, Clone)]
pub struct WalkReport {
    /// New candidates in acceptance order
    pub accepted: Vec<CandidateLink>,
    pub pages_scanned: u32,
    pub pages_failed: u32,
    /// Cards with an identifier seen across all loaded pages
    pub candidates_found: usize,
    /// Highest page number that was attempted
    pub last_page: u32,
    pub stop_reason: StopReason,
}

/// Walks listing pages of one source
pub struct FrontierWalker<'a> {
    source: &'a dyn Source,
    dedup: &'a DedupStore,
    quota: QuotaBoundedCollector,
    settings: WalkSettings,
}

impl<'a> FrontierWalker<'a> {
    pub fn new(
        source: &'a dyn Source,
        dedup: &'a DedupStore,
        quota: QuotaBoundedCollector,
        settings: WalkSettings,
    ) -> Self {
        Self {
            source,
            dedup,
            quota,
            settings,
        }
    }

    /// Visits pages `1..=max_page` in order
    ///
    /// Page failures are logged and skipped; they neither reset nor extend
    /// the empty-page streak.
    pub async fn walk(&self, session: &mut dyn PageSession, max_page: u32) -> WalkReport {
        let label = self.source.label();
        let mut accepted: Vec<CandidateLink> = Vec::new();
        let mut accepted_ids: HashSet<Identifier> = HashSet::new();
        let mut pages_scanned = 0;
        let mut pages_failed = 0;
        let mut candidates_found = 0;
        let mut last_page = 0;
        let mut empty_streak = 0;
        let mut page = 1;

        let stop_reason = loop {
            if page > max_page {
                break StopReason::BudgetExhausted;
            }

            if empty_streak >= self.settings.max_consecutive_empty_pages {
                info!(
                    source = %label,
                    "{} pages in a row without new items, stopping before page {}",
                    empty_streak, page
                );
                break StopReason::EmptyStreak;
            }

            if page > 1 {
                let pause = self.settings.page_pause.sample();
                debug!(page, "Pausing {:?} before next listing page", pause);
                tokio::time::sleep(pause).await;
            }

            last_page = page;
            let cards = match self.source.list_page(session, page).await {
                Ok(cards) => cards,
                Err(e) => {
                    warn!(source = %label, page, "Listing page failed, skipping: {}", e);
                    pages_failed += 1;
                    page += 1;
                    continue;
                }
            };

            pages_scanned += 1;
            candidates_found += cards.len();

            let mut new_on_page = 0;
            let mut quota_hit = false;
            for card in cards {
                if !self.quota.should_continue(accepted.len()) {
                    quota_hit = true;
                    break;
                }

                if self.dedup.contains(&card.identifier) {
                    continue;
                }
                if !accepted_ids.insert(card.identifier.clone()) {
                    continue;
                }

                debug!(page, identifier = %card.identifier, url = %card.url, "Accepted");
                accepted.push(card);
                new_on_page += 1;
            }

            if !self.quota.should_continue(accepted.len()) {
                quota_hit = true;
            }

            if new_on_page > 0 {
                empty_streak = 0;
            } else {
                empty_streak += 1;
            }

            info!(
                source = %label,
                page,
                new = new_on_page,
                total = accepted.len(),
                remaining = self.quota.remaining(accepted.len()),
                "Scanned listing page {}/{}",
                page,
                max_page
            );

            if quota_hit {
                info!(source = %label, "Quota of {} reached on page {}", self.quota.quota(), page);
                break StopReason::QuotaReached;
            }

            page += 1;
        };

        WalkReport {
            accepted,
            pages_scanned,
            pages_failed,
            candidates_found,
            last_page,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{empty_store, store_with, FakeSession, FakeSource};

    fn settings(threshold: u32) -> WalkSettings {
        WalkSettings {
            max_consecutive_empty_pages: threshold,
            page_pause: PauseRange::ZERO,
        }
    }

    fn ids(report: &WalkReport) -> Vec<&str> {
        report.accepted.iter().map(|c| c.identifier.as_str()).collect()
    }

    #[tokio::test]
    async fn test_walks_whole_budget() {
        let source = FakeSource::new(vec![vec!["1", "2"], vec!["3"], vec!["4", "5"]]);
        let store = empty_store();
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(100), settings(5));

        let report = walker.walk(&mut FakeSession::new(1), 3).await;

        assert_eq!(ids(&report), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(report.pages_scanned, 3);
        assert_eq!(report.candidates_found, 5);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(source.requested_pages(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_early_stop_after_three_seen_pages() {
        // Pages 1-3 are new, 4-8 are already known
        let pages: Vec<Vec<String>> = (1..=8)
            .map(|p| (0..4).map(|i| format!("{}-{}", p, i)).collect())
            .collect();
        let known: Vec<String> = pages[3..].iter().flatten().cloned().collect();
        let source = FakeSource::from_owned(pages);
        let store = store_with(&known);
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(100), settings(3));

        let report = walker.walk(&mut FakeSession::new(1), 8).await;

        assert_eq!(report.accepted.len(), 12);
        assert_eq!(report.stop_reason, StopReason::EmptyStreak);
        assert_eq!(report.pages_scanned, 6);
        assert_eq!(source.requested_pages(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_early_stop_never_loads_page_past_streak() {
        // Pages 1-4 are new, 5-8 are known; the streak completes on page 7
        let pages: Vec<Vec<String>> = (1..=8)
            .map(|p| (0..2).map(|i| format!("{}-{}", p, i)).collect())
            .collect();
        let known: Vec<String> = pages[4..].iter().flatten().cloned().collect();
        let source = FakeSource::from_owned(pages);
        let store = store_with(&known);
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(100), settings(3));

        let report = walker.walk(&mut FakeSession::new(1), 8).await;

        assert_eq!(report.stop_reason, StopReason::EmptyStreak);
        assert_eq!(report.last_page, 7);
        assert!(!source.requested_pages().contains(&8));
    }

    #[tokio::test]
    async fn test_empty_page_counts_towards_streak() {
        let source = FakeSource::new(vec![vec!["1"], vec![], vec![], vec!["2"]]);
        let store = empty_store();
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(100), settings(2));

        let report = walker.walk(&mut FakeSession::new(1), 4).await;

        assert_eq!(ids(&report), vec!["1"]);
        assert_eq!(report.stop_reason, StopReason::EmptyStreak);
        assert_eq!(source.requested_pages(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_pages_skipped_without_streak() {
        let source =
            FakeSource::new(vec![vec!["1"], vec!["2"], vec!["3"], vec!["4"]]).with_failing_pages(&[2, 3]);
        let store = empty_store();
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(100), settings(1));

        let report = walker.walk(&mut FakeSession::new(1), 4).await;

        assert_eq!(ids(&report), vec!["1", "4"]);
        assert_eq!(report.pages_failed, 2);
        assert_eq!(report.pages_scanned, 2);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
    }

    #[tokio::test]
    async fn test_quota_stops_mid_page() {
        let source = FakeSource::new(vec![
            vec!["a1", "a2", "a3", "a4"],
            vec!["b1", "b2", "b3", "b4"],
        ]);
        let store = empty_store();
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(5), settings(5));

        let report = walker.walk(&mut FakeSession::new(1), 2).await;

        assert_eq!(ids(&report), vec!["a1", "a2", "a3", "a4", "b1"]);
        assert_eq!(report.stop_reason, StopReason::QuotaReached);
        assert_eq!(report.last_page, 2);
    }

    #[tokio::test]
    async fn test_quota_reached_at_page_end_loads_no_more() {
        let source = FakeSource::new(vec![vec!["1", "2"], vec!["3"]]);
        let store = empty_store();
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(2), settings(5));

        let report = walker.walk(&mut FakeSession::new(1), 2).await;

        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.stop_reason, StopReason::QuotaReached);
        assert_eq!(source.requested_pages(), vec![1]);
    }

    #[tokio::test]
    async fn test_duplicates_within_run_and_store_filtered() {
        let source = FakeSource::new(vec![vec!["1", "2", "1"], vec!["2", "3", "9"]]);
        let store = store_with(&["9".to_string()]);
        let walker =
            FrontierWalker::new(&source, &store, QuotaBoundedCollector::new(100), settings(5));

        let report = walker.walk(&mut FakeSession::new(1), 2).await;

        assert_eq!(ids(&report), vec!["1", "2", "3"]);
        assert_eq!(report.accepted[2].page, 2);
        assert_eq!(report.candidates_found, 6);
    }
}
