//! URL handling module for Gleaner
//!
//! Listing cards link to detail pages in many slightly different spellings.
//! Everything that derives an identifier from a link goes through
//! `canonicalize_link` first.

mod normalize;

pub use normalize::canonicalize_link;
