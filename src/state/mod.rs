//! State module for tracking crawl progress
//!
//! `IdOutcome` records how each identifier of a run finished. The run
//! summary is a tally of these outcomes.

mod outcome;

pub use outcome::IdOutcome;
