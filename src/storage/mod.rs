//! Storage module for the identifier history
//!
//! This module keeps track of which listing items have already been committed:
//! - `DedupStore`: the in-memory set with load / contains / add / flush
//! - `FileBackend`: one newline-delimited history file per scope
//! - `SqliteBackend`: one table shared by all scopes

mod dedup;
mod file;
mod schema;
mod sqlite;
mod traits;

pub use dedup::DedupStore;
pub use file::{history_path, FileBackend};
pub use sqlite::SqliteBackend;
pub use traits::{DedupBackend, PersistedHistory, StoreError, StoreResult};

use crate::config::{DedupBackendKind, DedupConfig};
use std::path::Path;

/// Opens the dedup store for a scope using the configured backend
///
/// The store is returned unloaded; call `DedupStore::load` at run start.
///
/// # Arguments
///
/// * `config` - Dedup section of the configuration
/// * `scope` - Name of the identifier history
///
/// # Returns
///
/// * `Ok(DedupStore)` - Store bound to the scope
/// * `Err(StoreError)` - The SQLite database could not be opened
pub fn open_dedup_store(config: &DedupConfig, scope: &str) -> StoreResult<DedupStore> {
    let backend: Box<dyn DedupBackend> = match config.backend {
        DedupBackendKind::File => Box::new(FileBackend::new(Path::new(&config.directory), scope)),
        DedupBackendKind::Sqlite => {
            Box::new(SqliteBackend::open(Path::new(&config.database_path), scope)?)
        }
    };
    Ok(DedupStore::new(scope, backend))
}
