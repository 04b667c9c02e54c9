//! Configuration module for hltb-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use hltb_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Writing rows to {}", config.output.path);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlConfig, HttpConfig, LoggingConfig, OutputConfig, RetryConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, MAX_CONCURRENCY};
