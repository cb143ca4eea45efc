//! Output sink trait and the records it receives

use crate::state::Identifier;
use chrono::Local;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output already finalized")]
    Finalized,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Extracted fields of one detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRecord {
    pub identifier: Identifier,

    /// Canonical detail link
    pub link: String,

    /// Source name
    pub source: String,

    /// Date the record was scraped, `%Y-%m-%d`
    pub scraped_at: String,

    /// Named fields in column order; missing fields are empty strings
    pub fields: Vec<(String, String)>,
}

impl DetailRecord {
    /// Starts a record stamped with today's date
    pub fn new(identifier: Identifier, link: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            identifier,
            link: link.into(),
            source: source.into(),
            scraped_at: Local::now().format("%Y-%m-%d").to_string(),
            fields: Vec::new(),
        }
    }

    /// Sets a field, replacing an earlier value of the same name
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// True when every extracted field is blank
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.trim().is_empty())
    }
}

/// Destination for committed detail records
///
/// A record counts as committed once `append` returns `Ok`. `finalize`
/// publishes the artifact; with nothing appended it leaves no artifact.
pub trait OutputSink: Send {
    fn append(&mut self, record: &DetailRecord) -> OutputResult<()>;

    /// Number of records appended so far
    fn appended(&self) -> usize;

    /// Publishes the artifact, returning its path if one exists
    fn finalize(&mut self) -> OutputResult<Option<PathBuf>>;
}
