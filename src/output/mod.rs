//! Output module for run summaries and dataset reports
//!
//! This module handles:
//! - Counting per-identifier outcomes of a run
//! - Statistics over an existing output file
//! - Exporting a filtered dataset split by content type

mod split;
pub mod stats;

pub use split::{print_split_report, split_dataset, SplitFile, SplitReport};
pub use stats::{load_statistics, print_statistics, print_summary, OutputStatistics, RunSummary};

use crate::storage::{time_columns, StorageError, StorageResult};
use csv::StringRecord;

fn column_index(headers: &StringRecord, name: &str) -> StorageResult<usize> {
    headers
        .iter()
        .position(|column| column == name)
        .ok_or_else(|| StorageError::SchemaMismatch(format!("missing column '{}'", name)))
}

fn time_column_indices(headers: &StringRecord) -> StorageResult<Vec<usize>> {
    time_columns()
        .iter()
        .map(|name| column_index(headers, name))
        .collect()
}

/// True if any completion-time cell of `row` is non-empty
fn has_completion_times(row: &StringRecord, time_indices: &[usize]) -> bool {
    time_indices
        .iter()
        .any(|&i| row.get(i).is_some_and(|cell| !cell.trim().is_empty()))
}
