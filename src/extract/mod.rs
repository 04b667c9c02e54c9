//! Extraction of game records from page bodies
//!
//! This module contains:
//! - Record types (`Record`, `ContentType`, `ReleaseDate`, `CompletionTimes`)
//! - Label normalization shared by every completion-time source
//! - Hours, count and release-date parsing
//! - The `Extractor`, a pure `body -> Record | ExtractionFailure` function

mod date;
mod hours;
pub mod labels;
mod page;
mod record;
mod selectors;

pub use date::parse_release_date;
pub use hours::{format_hours, parse_count, parse_hours};
pub use labels::{CanonicalLabel, LabelVocabulary, KNOWN_LABELS};
pub use page::{ExtractionFailure, Extractor, FailureReason, Page};
pub use record::{CompletionTime, CompletionTimes, ContentType, Record, ReleaseDate};
