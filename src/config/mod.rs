//! Configuration module for Gleaner
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use gleaner::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gleaner.toml")).unwrap();
//! println!("Harvesting at most {} new items per run", config.harvest.quota);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BudgetConfig, Config, DedupBackendKind, DedupConfig, FieldConfig, FieldMode, HarvestConfig,
    LoggingConfig, OutputConfig, PacingConfig, PauseRange, SessionConfig, SourceConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, select_source,
};

pub use validation::MAX_WORKERS;
