//! SQLite dedup backend
//!
//! All scopes share one database; each backend instance is bound to one scope.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DedupBackend, PersistedHistory, StoreError, StoreResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQLite-backed identifier history for one scope
pub struct SqliteBackend {
    conn: Connection,
    scope: String,
    location: String,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database at `path` for `scope`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `scope` - Dedup scope this backend reads and writes
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteBackend)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn open(path: &Path, scope: &str) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: PathBuf::from(parent),
                    source: e,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            scope: scope.to_string(),
            location: format!("{} [{}]", path.display(), scope),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(scope: &str) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            scope: scope.to_string(),
            location: format!(":memory: [{}]", scope),
        })
    }

    /// Number of identifiers stored for every scope in the database
    pub fn scope_counts(&self) -> StoreResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT scope, COUNT(*) FROM seen_identifiers GROUP BY scope ORDER BY scope",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl DedupBackend for SqliteBackend {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn read_all(&self) -> StoreResult<PersistedHistory> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier FROM seen_identifiers WHERE scope = ?1 ORDER BY rowid",
        )?;
        let ids = stmt
            .query_map(params![self.scope], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PersistedHistory::complete(ids))
    }

    fn write_all(&mut self, identifiers: &[String]) -> StoreResult<()> {
        self.insert_missing(identifiers)
    }

    fn append(&mut self, identifiers: &[String]) -> StoreResult<()> {
        self.insert_missing(identifiers)
    }
}

impl SqliteBackend {
    /// Inserts identifiers not yet stored for the scope; never deletes
    fn insert_missing(&mut self, identifiers: &[String]) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO seen_identifiers (scope, identifier, first_seen_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for id in identifiers {
                stmt.execute(params![self.scope, id, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
