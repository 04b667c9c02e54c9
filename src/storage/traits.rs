//! Storage traits and error types
//!
//! This module defines the trait interface for output sinks and the
//! associated error types.

use crate::extract::Record;
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// Any of these ends a run: continuing to append while durability is in
/// doubt could break the one-row-per-identifier guarantee.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output header does not match this version's columns: {0}")]
    SchemaMismatch(String),

    #[error("Corrupt output at row {row}: {reason}")]
    Corrupt { row: u64, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Output writer lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only destination for accepted records
///
/// Implementations must serialize concurrent appends and make each row
/// durable before `append` returns: a caller marks the identifier as
/// committed as soon as this returns `Ok`.
pub trait Sink: Send + Sync {
    /// Appends one record as one row
    fn append(&self, record: &Record) -> StorageResult<()>;
}
