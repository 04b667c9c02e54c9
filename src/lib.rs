//! hltb-harvest: a resumable crawler for numbered game pages
//!
//! This crate walks a range of sequential page identifiers, fetches each page
//! through a retrying HTTP layer, extracts completion-time records from the
//! HTML, and appends them to a CSV file that doubles as the resume ledger.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Identifier of one crawlable page (`GET <base>/<id>`)
pub type Identifier = u64;

/// Main error type for harvest runs
///
/// Only configuration and storage problems surface here. Network and
/// extraction failures are recovered per identifier and show up in the
/// run summary instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_harvest, Coordinator, FetchOutcome};
pub use extract::{ContentType, Extractor, Record, ReleaseDate};
pub use output::RunSummary;
pub use state::IdOutcome;
