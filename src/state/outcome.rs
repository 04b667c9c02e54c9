/// Terminal outcome definitions for crawled identifiers
///
/// Every identifier a run generates ends in exactly one of these states.
use std::fmt;

/// Represents how a single identifier finished within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdOutcome {
    // ===== Success =====
    /// Record was appended to the output and marked in the ledger
    Committed,

    // ===== Skips =====
    /// Identifier was already in the ledger; no network I/O was done
    SkippedExisting,

    /// Page was valid but had no completion times, and empty records are
    /// configured not to be committed
    SkippedEmpty,

    // ===== Expected absence =====
    /// Server reported the page does not exist, or the body was the site's
    /// not-found page
    NotFound,

    // ===== Failures =====
    /// Fetch ended in a fatal error or exhausted its retry budget
    Failed,

    /// Page was fetched but its layout could not be parsed
    ExtractionFailed,
}

impl IdOutcome {
    /// Returns true if this outcome wrote a row
    pub fn is_commit(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Returns true if this outcome counts toward the consecutive-miss
    /// threshold of an open-ended run
    ///
    /// Skipped-existing ids are neither a hit nor a miss.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            Self::SkippedEmpty | Self::NotFound | Self::Failed | Self::ExtractionFailed
        )
    }

    /// Name of the structured event emitted for this outcome
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::SkippedExisting => "skipped_existing",
            Self::SkippedEmpty => "skipped_empty",
            Self::NotFound => "not_found",
            Self::Failed => "fetch_failed",
            Self::ExtractionFailed => "extraction_failed",
        }
    }

    /// Returns all outcomes, in summary order
    pub fn all() -> Vec<IdOutcome> {
        vec![
            Self::Committed,
            Self::SkippedExisting,
            Self::SkippedEmpty,
            Self::NotFound,
            Self::Failed,
            Self::ExtractionFailed,
        ]
    }
}

impl fmt::Display for IdOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}
