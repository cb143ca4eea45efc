//! Crawler module for listing walks and detail fetching
//!
//! This module contains the core harvest logic, including:
//! - Page sessions over HTTP with rotation
//! - Page budget discovery and the ordered listing walk
//! - The quota bound and the early-stop rule
//! - Detail workers with pacing, retries and a single committing owner
//! - Overall run coordination

mod budget;
mod coordinator;
mod fetcher;
mod pacing;
pub mod parser;
mod pipeline;
mod quota;
mod walker;

pub use budget::PageBudgetEstimator;
pub use coordinator::{run_harvest, RunCoordinator};
pub use fetcher::{
    build_http_client, FetchError, HttpSession, HttpSessionFactory, LoadedPage, PageSession,
    SessionFactory,
};
pub use pacing::{AfterFetch, Cadence, PauseKind, PauseSchedule};
pub use parser::has_match;
pub use pipeline::{DetailFetchPipeline, PipelineReport, PipelineSettings};
pub use quota::QuotaBoundedCollector;
pub use walker::{FrontierWalker, WalkReport, WalkSettings};
