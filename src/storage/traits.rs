//! Storage traits and error types
//!
//! A `DedupBackend` persists the identifier history of exactly one dedup scope.
//! `DedupStore` owns the in-memory set and talks to the backend only at load
//! and flush time.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// What a backend could read back for a scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedHistory {
    /// Identifiers in first-seen order
    pub identifiers: Vec<String>,

    /// Entries present in storage that could not be decoded
    pub unreadable: usize,
}

impl PersistedHistory {
    pub fn complete(identifiers: Vec<String>) -> Self {
        Self {
            identifiers,
            unreadable: 0,
        }
    }
}

/// Durable home of one scope's identifier history
pub trait DedupBackend: Send {
    /// Human-readable location, for logs and `--stats`
    fn location(&self) -> String;

    /// Reads every persisted identifier in first-seen order
    ///
    /// A scope that was never written yields an empty history. Entries that
    /// cannot be decoded are counted in `unreadable` instead of failing the
    /// whole read.
    fn read_all(&self) -> StoreResult<PersistedHistory>;

    /// Durably persists the full set, replacing what was there
    ///
    /// `identifiers` is always a superset of the last successful write and
    /// keeps its order, so previously written identifiers form a prefix.
    fn write_all(&mut self, identifiers: &[String]) -> StoreResult<()>;

    /// Adds identifiers without touching what is already stored
    ///
    /// Used when the stored history could not be read in full, so a
    /// replacing write would lose entries.
    fn append(&mut self, identifiers: &[String]) -> StoreResult<()>;
}
