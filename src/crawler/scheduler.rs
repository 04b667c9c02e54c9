//! Identifier scheduling for the worker pool
//!
//! This module handles:
//! - Lazily generating the identifier range (bounded or open-ended)
//! - Filtering identifiers already present in the commit ledger
//! - Stopping dispatch on cancellation
//! - Stopping open-ended runs after a streak of misses

use crate::state::IdOutcome;
use crate::storage::CommitLedger;
use crate::Identifier;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Lazy sequence `start, start + 1, ..`, optionally bounded by a count
#[derive(Debug, Clone)]
pub struct IdRange {
    next: Option<Identifier>,
    /// Exclusive upper bound; `None` for open-ended runs
    end: Option<Identifier>,
}

impl IdRange {
    pub fn new(start: Identifier, count: Option<u64>) -> Self {
        let end = count.map(|count| start.saturating_add(count));
        Self {
            next: Some(start),
            end,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.end.is_some()
    }
}

impl Iterator for IdRange {
    type Item = Identifier;

    fn next(&mut self) -> Option<Identifier> {
        let id = self.next?;
        if let Some(end) = self.end {
            if id >= end {
                return None;
            }
        }
        self.next = id.checked_add(1);
        Some(id)
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.next, self.end) {
            (Some(next), Some(end)) if next < end => write!(f, "{}..={}", next, end - 1),
            (Some(next), None) => write!(f, "{}..", next),
            _ => f.write_str("(empty)"),
        }
    }
}

/// What a worker should do with the next identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Fetch, extract and commit this identifier
    Fetch(Identifier),

    /// Identifier is in the ledger; count it without any network I/O
    AlreadyCommitted(Identifier),
}

/// Shared queue that workers pull identifiers from
pub struct Scheduler {
    ids: Mutex<IdRange>,
    ledger: Arc<CommitLedger>,
    cancel: CancellationToken,

    /// Consecutive-miss limit, only set for open-ended ranges
    miss_threshold: Option<u64>,
    miss_streak: AtomicU64,
    miss_limit_reached: AtomicBool,
}

impl Scheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `ids` - Identifier range to walk
    /// * `ledger` - Identifiers already committed
    /// * `miss_threshold` - Consecutive misses that end an open-ended range;
    ///   ignored for bounded ranges
    /// * `cancel` - Stops dispatch when tripped
    pub fn new(
        ids: IdRange,
        ledger: Arc<CommitLedger>,
        miss_threshold: u64,
        cancel: CancellationToken,
    ) -> Self {
        let miss_threshold = if ids.is_bounded() {
            None
        } else {
            Some(miss_threshold.max(1))
        };

        Self {
            ids: Mutex::new(ids),
            ledger,
            cancel,
            miss_threshold,
            miss_streak: AtomicU64::new(0),
            miss_limit_reached: AtomicBool::new(false),
        }
    }

    /// Takes the next identifier, or `None` once the run should stop
    pub fn next(&self) -> Option<Dispatch> {
        if self.cancel.is_cancelled() || self.miss_limit_reached() {
            return None;
        }

        let id = match self.ids.lock() {
            Ok(mut ids) => ids.next(),
            Err(poisoned) => poisoned.into_inner().next(),
        }?;

        if self.ledger.is_committed(id) {
            Some(Dispatch::AlreadyCommitted(id))
        } else {
            Some(Dispatch::Fetch(id))
        }
    }

    /// Feeds a terminal outcome into the miss streak
    ///
    /// The streak counts outcomes in completion order; a commit resets it.
    pub fn observe(&self, outcome: IdOutcome) {
        if outcome.is_commit() {
            self.miss_streak.store(0, Ordering::SeqCst);
            return;
        }
        if !outcome.is_miss() {
            return;
        }

        let streak = self.miss_streak.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(threshold) = self.miss_threshold {
            if streak >= threshold && !self.miss_limit_reached.swap(true, Ordering::SeqCst) {
                tracing::info!(
                    "Stopping after {} consecutive ids without a record",
                    streak
                );
            }
        }
    }

    pub fn miss_streak(&self) -> u64 {
        self.miss_streak.load(Ordering::SeqCst)
    }

    pub fn miss_limit_reached(&self) -> bool {
        self.miss_limit_reached.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scheduler: &Scheduler) -> Vec<Dispatch> {
        std::iter::from_fn(|| scheduler.next()).collect()
    }

    #[test]
    fn test_bounded_range() {
        let ids: Vec<_> = IdRange::new(5, Some(3)).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        assert_eq!(IdRange::new(5, Some(0)).count(), 0);
        assert_eq!(IdRange::new(5, Some(3)).to_string(), "5..=7");
    }

    #[test]
    fn test_open_range_is_lazy() {
        let ids: Vec<_> = IdRange::new(1, None).take(4).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(IdRange::new(9, None).to_string(), "9..");
    }

    #[test]
    fn test_range_stops_at_identifier_max() {
        let ids: Vec<_> = IdRange::new(u64::MAX - 1, None).collect();
        assert_eq!(ids, vec![u64::MAX - 1, u64::MAX]);
    }

    #[test]
    fn test_committed_ids_are_not_fetched() {
        let ledger = Arc::new(CommitLedger::from_ids([2, 4]));
        let scheduler = Scheduler::new(
            IdRange::new(1, Some(5)),
            ledger,
            10,
            CancellationToken::new(),
        );

        assert_eq!(
            drain(&scheduler),
            vec![
                Dispatch::Fetch(1),
                Dispatch::AlreadyCommitted(2),
                Dispatch::Fetch(3),
                Dispatch::AlreadyCommitted(4),
                Dispatch::Fetch(5),
            ]
        );
    }

    #[test]
    fn test_cancellation_stops_dispatch() {
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            IdRange::new(1, None),
            Arc::new(CommitLedger::new()),
            10,
            cancel.clone(),
        );

        assert!(scheduler.next().is_some());
        cancel.cancel();
        assert!(scheduler.next().is_none());
    }

    #[test]
    fn test_miss_threshold_ends_open_range() {
        let scheduler = Scheduler::new(
            IdRange::new(1, None),
            Arc::new(CommitLedger::new()),
            3,
            CancellationToken::new(),
        );

        scheduler.observe(IdOutcome::NotFound);
        scheduler.observe(IdOutcome::Failed);
        scheduler.observe(IdOutcome::Committed);
        assert_eq!(scheduler.miss_streak(), 0);

        scheduler.observe(IdOutcome::NotFound);
        scheduler.observe(IdOutcome::SkippedExisting);
        scheduler.observe(IdOutcome::ExtractionFailed);
        assert!(scheduler.next().is_some());

        scheduler.observe(IdOutcome::SkippedEmpty);
        assert!(scheduler.miss_limit_reached());
        assert!(scheduler.next().is_none());
    }

    #[test]
    fn test_miss_threshold_ignored_for_bounded_range() {
        let scheduler = Scheduler::new(
            IdRange::new(1, Some(4)),
            Arc::new(CommitLedger::new()),
            1,
            CancellationToken::new(),
        );

        for _ in 0..10 {
            scheduler.observe(IdOutcome::NotFound);
        }
        assert!(!scheduler.miss_limit_reached());
        assert_eq!(drain(&scheduler).len(), 4);
    }
}
