//! Crawler module for fetching and processing numbered pages
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with classified outcomes
//! - Retry with capped exponential backoff and jitter
//! - Identifier scheduling over a fixed worker pool
//! - Overall run coordination

mod coordinator;
mod endpoint;
mod fetcher;
mod retry;
mod scheduler;

pub use coordinator::{run_harvest, Coordinator};
pub use endpoint::Endpoint;
pub use fetcher::{
    build_http_client, parse_retry_after, FetchOutcome, FetchTrace, Fetcher, HttpTransport,
    Transport,
};
pub use retry::{RetryPolicy, RetryState};
pub use scheduler::{Dispatch, IdRange, Scheduler};
