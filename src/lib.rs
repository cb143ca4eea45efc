//! Gleaner: an incremental listing harvester
//!
//! This crate walks the paginated listings of a content source, remembers every
//! item it has already committed across runs, and fetches detail records for the
//! new ones under pacing, retry and session-rotation limits.

pub mod config;
pub mod crawler;
pub mod output;
pub mod source;
pub mod state;
pub mod storage;
pub mod url;

#[cfg(test)]
pub(crate) mod test_support;

use thiserror::Error;

/// Main error type for Gleaner operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dedup store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("No session could be opened for {source_label}: {reason}")]
    SessionUnavailable {
        source_label: String,
        reason: crawler::FetchError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("No source matches '{0}'")]
    UnknownSource(String),

    #[error("No sources configured")]
    NoSources,
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Gleaner operations
pub type Result<T> = std::result::Result<T, GleanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_harvest, RunCoordinator};
pub use output::RunSummary;
pub use state::{CandidateLink, Identifier, ItemOutcome, StopReason};
pub use storage::DedupStore;
pub use url::canonicalize_link;
