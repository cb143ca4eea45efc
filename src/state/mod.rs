//! State module for harvest progress
//!
//! # Components
//!
//! - `Identifier` / `CandidateLink`: items discovered while walking listing pages
//! - `ItemOutcome`: what happened to each accepted item in the detail pipeline
//! - `StopReason`: why the frontier walk ended

mod identifier;
mod outcome;

// Re-export main types
pub use identifier::{CandidateLink, Identifier};
pub use outcome::{FailReason, ItemOutcome, SkipReason, StopReason};
