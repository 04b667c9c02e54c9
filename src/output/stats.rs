//! Run summaries and statistics over an output file
//!
//! `RunSummary` counts how each identifier of one run finished.
//! `OutputStatistics` describes what an output file holds, across every run
//! that appended to it.

use crate::output::{column_index, has_completion_times, time_column_indices};
use crate::state::IdOutcome;
use crate::storage::{StorageResult, CONTENT_TYPE_COLUMN, RELEASE_PRECISION_COLUMN};
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Per-outcome counts for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub committed: u64,
    pub skipped_existing: u64,
    pub skipped_empty: u64,
    pub not_found: u64,

    /// Fetches that ended fatally or exhausted their retries
    pub failed: u64,

    /// Pages fetched but not parseable
    pub errors: u64,

    /// Dispatch was stopped by an interrupt
    pub cancelled: bool,

    /// An open-ended run stopped after too many consecutive misses
    pub miss_limit_reached: bool,

    pub elapsed: Duration,
}

impl RunSummary {
    pub fn record(&mut self, outcome: IdOutcome) {
        *self.counter(outcome) += 1;
    }

    /// Adds another partial summary's counts to this one
    pub fn merge(&mut self, other: &RunSummary) {
        for outcome in IdOutcome::all() {
            *self.counter(outcome) += other.count(outcome);
        }
        self.cancelled |= other.cancelled;
        self.miss_limit_reached |= other.miss_limit_reached;
        self.elapsed = self.elapsed.max(other.elapsed);
    }

    pub fn count(&self, outcome: IdOutcome) -> u64 {
        match outcome {
            IdOutcome::Committed => self.committed,
            IdOutcome::SkippedExisting => self.skipped_existing,
            IdOutcome::SkippedEmpty => self.skipped_empty,
            IdOutcome::NotFound => self.not_found,
            IdOutcome::Failed => self.failed,
            IdOutcome::ExtractionFailed => self.errors,
        }
    }

    /// Number of identifiers that reached a terminal outcome
    pub fn total(&self) -> u64 {
        IdOutcome::all().into_iter().map(|o| self.count(o)).sum()
    }

    fn counter(&mut self, outcome: IdOutcome) -> &mut u64 {
        match outcome {
            IdOutcome::Committed => &mut self.committed,
            IdOutcome::SkippedExisting => &mut self.skipped_existing,
            IdOutcome::SkippedEmpty => &mut self.skipped_empty,
            IdOutcome::NotFound => &mut self.not_found,
            IdOutcome::Failed => &mut self.failed,
            IdOutcome::ExtractionFailed => &mut self.errors,
        }
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Identifiers processed: {}", summary.total());
    println!("  Committed:        {}", summary.committed);
    println!("  Skipped existing: {}", summary.skipped_existing);
    println!("  Skipped empty:    {}", summary.skipped_empty);
    println!("  Not found:        {}", summary.not_found);
    println!("  Failed:           {}", summary.failed);
    println!("  Extraction errors: {}", summary.errors);
    println!();

    let secs = summary.elapsed.as_secs_f64();
    if secs > 0.0 {
        println!(
            "Elapsed: {:.1}s ({:.2} ids/sec)",
            secs,
            summary.total() as f64 / secs
        );
    }

    if summary.cancelled {
        println!("Run was interrupted; re-run to resume from the output file.");
    } else if summary.miss_limit_reached {
        println!("Stopped after a long streak of ids without a record.");
    }
}

/// Statistics about the rows of an output file
#[derive(Debug, Clone, Default)]
pub struct OutputStatistics {
    pub total_rows: u64,

    /// Rows with at least one completion time
    pub rows_with_times: u64,

    pub rows_by_content_type: BTreeMap<String, u64>,
    pub rows_by_precision: BTreeMap<String, u64>,
}

/// Loads statistics from an output file
///
/// # Arguments
///
/// * `path` - The output CSV to read
///
/// # Returns
///
/// * `Ok(OutputStatistics)` - Successfully read statistics
/// * `Err(StorageError)` - The file is missing, unreadable or lacks the
///   expected columns
pub fn load_statistics(path: &Path) -> StorageResult<OutputStatistics> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let content_type = column_index(&headers, CONTENT_TYPE_COLUMN)?;
    let precision = column_index(&headers, RELEASE_PRECISION_COLUMN)?;
    let times = time_column_indices(&headers)?;

    let mut stats = OutputStatistics::default();
    for row in reader.records() {
        let row = row?;
        stats.total_rows += 1;

        if has_completion_times(&row, &times) {
            stats.rows_with_times += 1;
        }

        let kind = row.get(content_type).unwrap_or_default().to_string();
        *stats.rows_by_content_type.entry(kind).or_insert(0) += 1;

        let level = row.get(precision).unwrap_or_default().to_string();
        *stats.rows_by_precision.entry(level).or_insert(0) += 1;
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &OutputStatistics) {
    println!("=== Output Statistics ===\n");

    println!("Overview:");
    println!("  Total rows: {}", stats.total_rows);
    println!("  Rows with completion times: {}", stats.rows_with_times);
    println!();

    print_breakdown("Rows by Content Type:", &stats.rows_by_content_type, stats.total_rows);
    print_breakdown("Rows by Release Precision:", &stats.rows_by_precision, stats.total_rows);
}

fn print_breakdown(title: &str, counts: &BTreeMap<String, u64>, total: u64) {
    println!("{}", title);
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1));

    for (name, count) in sorted {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", name, count, percentage);
    }
    println!();
}
