//! Database schema for the SQLite dedup backend

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Identifiers committed to output, per dedup scope
CREATE TABLE IF NOT EXISTS seen_identifiers (
    scope TEXT NOT NULL,
    identifier TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    PRIMARY KEY (scope, identifier)
);

CREATE INDEX IF NOT EXISTS idx_seen_identifiers_scope ON seen_identifiers(scope);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - Database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
