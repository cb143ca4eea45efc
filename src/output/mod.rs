//! Output module for harvest artifacts and summaries
//!
//! This module handles:
//! - Writing committed detail records to per-run CSV artifacts
//! - Run summaries and identifier history statistics

mod csv_sink;
pub mod stats;
mod traits;

pub use csv_sink::{artifact_stem, CsvSink, FIXED_COLUMNS};
pub use stats::{
    print_store_statistics, print_summary, FlushStatus, RunSummary, ScopeStatistics,
};
pub use traits::{DetailRecord, OutputError, OutputResult, OutputSink};
