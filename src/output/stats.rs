//! Run summaries and dedup store statistics
//!
//! A `RunSummary` is produced once per run, logged, and printed by the binary.
//! Nothing here is persisted.

use crate::state::{ItemOutcome, SkipReason, StopReason};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// What happened to the identifier history at the end of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushStatus {
    /// Nothing new was committed, the history was left untouched
    Skipped,

    /// The grown history was written
    Flushed,

    /// The artifact was not committed, so the history was not written
    Withheld(String),

    /// Writing the history failed; committed output stays in place
    Failed(String),
}

impl FlushStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Withheld(_) | Self::Failed(_))
    }
}

/// Counters and results for one harvest run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: String,
    pub scope: String,
    pub page_budget: u32,
    pub pages_scanned: u32,
    pub pages_failed: u32,
    pub candidates_found: usize,
    pub accepted: usize,
    pub committed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stop_reason: StopReason,
    pub artifact: Option<PathBuf>,
    pub flush: FlushStatus,
    pub elapsed: Duration,
    pub outcomes: Vec<ItemOutcome>,
}

impl RunSummary {
    /// Items that a later run will try again
    pub fn retry_eligible(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.is_retry_eligible())
    }

    pub fn empty_records(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    ItemOutcome::Skipped {
                        reason: SkipReason::EmptyRecord,
                        ..
                    }
                )
            })
            .count()
    }

    /// Emits the summary as one structured log line
    pub fn log(&self) {
        info!(
            source = %self.source,
            scope = %self.scope,
            pages_scanned = self.pages_scanned,
            pages_failed = self.pages_failed,
            accepted = self.accepted,
            committed = self.committed,
            skipped = self.skipped,
            failed = self.failed,
            stop_reason = %self.stop_reason,
            "Run finished in {:.1}s",
            self.elapsed.as_secs_f64()
        );
    }
}

/// Prints a run summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `summary` - The summary to display
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary: {} ===\n", summary.source);

    println!("Walk:");
    println!("  Page budget: {}", summary.page_budget);
    println!("  Pages scanned: {}", summary.pages_scanned);
    println!("  Pages failed: {}", summary.pages_failed);
    println!("  Candidates found: {}", summary.candidates_found);
    println!("  New identifiers accepted: {}", summary.accepted);
    println!("  Stopped because: {}", summary.stop_reason);
    println!();

    println!("Details:");
    println!("  Committed: {}", summary.committed);
    println!(
        "  Skipped: {} ({} empty records)",
        summary.skipped,
        summary.empty_records()
    );
    println!("  Failed: {}", summary.failed);

    let retry: Vec<_> = summary.retry_eligible().collect();
    if !retry.is_empty() {
        println!("  Retry next run ({}):", retry.len());
        for outcome in retry.iter().take(10) {
            println!("    - {}", outcome.identifier());
        }
        if retry.len() > 10 {
            println!("    ... and {} more", retry.len() - 10);
        }
    }
    println!();

    match &summary.artifact {
        Some(path) => println!("Artifact: {}", path.display()),
        None => println!("Artifact: none"),
    }

    match &summary.flush {
        FlushStatus::Skipped => println!("History ({}): unchanged", summary.scope),
        FlushStatus::Flushed => println!("History ({}): updated", summary.scope),
        FlushStatus::Withheld(reason) => {
            println!("History ({}): NOT updated, {}", summary.scope, reason)
        }
        FlushStatus::Failed(reason) => {
            println!("History ({}): FLUSH FAILED, {}", summary.scope, reason)
        }
    }

    println!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
}

/// Size of one scope's identifier history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStatistics {
    pub scope: String,
    pub identifiers: usize,
    pub location: String,
}

/// Prints per-scope history sizes to stdout
pub fn print_store_statistics(stats: &[ScopeStatistics]) {
    println!("=== Identifier History ===\n");

    if stats.is_empty() {
        println!("  No sources configured");
        return;
    }

    let total: usize = stats.iter().map(|s| s.identifiers).sum();
    for entry in stats {
        println!(
            "  {}: {} identifiers ({})",
            entry.scope, entry.identifiers, entry.location
        );
    }
    println!();
    println!("Total: {} identifiers across {} scopes", total, stats.len());
}
