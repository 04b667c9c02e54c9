//! Storage module for persisting harvested records
//!
//! This module owns the output file, including:
//! - The fixed CSV column layout
//! - Durable, serialized appends
//! - Deriving the commit ledger from an existing file on resume
//! - Repairing a torn final row after a crash

mod csv_sink;
mod ledger;
mod schema;
mod traits;

pub use csv_sink::CsvSink;
pub use ledger::CommitLedger;
pub use schema::{
    header, record_to_row, time_columns, CONTENT_TYPE_COLUMN, ID_COLUMN, OTHER_TIMES_COLUMN,
    RELEASE_PRECISION_COLUMN, SERVICE_COLUMNS, TITLE_COLUMN,
};
pub use traits::{Sink, StorageError, StorageResult};

use std::path::Path;

/// Opens the output file for appending
///
/// # Arguments
///
/// * `path` - Path to the CSV output
/// * `resume` - Keep existing rows and treat their identifiers as committed
///
/// # Returns
///
/// * `Ok((CsvSink, CommitLedger))` - Ready sink and the identifiers already present
/// * `Err(StorageError)` - Failed to open or validate the output
pub fn open_output(path: &Path, resume: bool) -> StorageResult<(CsvSink, CommitLedger)> {
    CsvSink::open(path, resume)
}
