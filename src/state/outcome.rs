//! Per-item and per-walk results of a harvest run
//!
//! Every accepted candidate ends in exactly one `ItemOutcome`. Only
//! `Committed` items are recorded in the dedup store; everything else is
//! picked up again by a later run.

use crate::state::Identifier;
use std::fmt;

/// Why an item was dropped without being written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The identifier became a dedup store member before this item was committed
    AlreadyCommitted,

    /// The detail page loaded but every extracted field was blank
    EmptyRecord,
}

/// Why an item could not be committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// Detail page failed to load or parse
    Fetch(String),

    /// No session could be opened for the worker
    Session(String),

    /// The output sink rejected the record
    Output(String),
}

/// Result of processing one accepted candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Committed {
        identifier: Identifier,
    },
    Skipped {
        identifier: Identifier,
        reason: SkipReason,
    },
    Failed {
        identifier: Identifier,
        reason: FailReason,
    },
}

impl ItemOutcome {
    pub fn identifier(&self) -> &Identifier {
        match self {
            Self::Committed { identifier }
            | Self::Skipped { identifier, .. }
            | Self::Failed { identifier, .. } => identifier,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// Returns true if a later run should attempt this identifier again
    ///
    /// Failed items and empty records stay out of the dedup store. An item
    /// skipped because it was already committed is never retried.
    pub fn is_retry_eligible(&self) -> bool {
        match self {
            Self::Committed { .. } => false,
            Self::Skipped { reason, .. } => *reason == SkipReason::EmptyRecord,
            Self::Failed { .. } => true,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyCommitted => write!(f, "already committed"),
            Self::EmptyRecord => write!(f, "empty record"),
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(msg) => write!(f, "fetch failed: {}", msg),
            Self::Session(msg) => write!(f, "no session: {}", msg),
            Self::Output(msg) => write!(f, "output rejected: {}", msg),
        }
    }
}

/// Why the frontier walk ended; all of these are normal terminations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Every page in the budget was visited
    BudgetExhausted,

    /// Too many loaded pages in a row yielded nothing new
    EmptyStreak,

    /// The per-run quota was reached
    QuotaReached,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetExhausted => "budget_exhausted",
            Self::EmptyStreak => "empty_streak",
            Self::QuotaReached => "quota_reached",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
