//! Retry policy for fetch attempts
//!
//! Each identifier moves through
//! `Pending -> Attempting(k) -> Retrying { .. } -> Attempting(k + 1) -> .. -> Finished`.
//! The policy only decides the transition after an attempt; sleeping and
//! re-issuing the request is the fetcher's job.

use crate::config::RetryConfig;
use crate::crawler::FetchOutcome;
use std::time::Duration;

/// Where one identifier is in its retry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    Attempting(u32),
    Retrying { next_attempt: u32, delay: Duration },
    Finished,
}

/// Capped exponential backoff with uniform jitter
///
/// The delay before retry `r` (the `r + 1`th attempt) is
/// `min(cap, base * 2^(r-1)) + uniform(0, jitter_window)`, so the first
/// retry waits `base`. A server `Retry-After` hint lower-bounds the result,
/// up to `max_retry_after`; a longer hint ends the retries instead.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    cap: Duration,
    jitter_window: Duration,
    max_retry_after: Duration,
}

/// Longest server-requested wait honoured unless configured otherwise
pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, cap: Duration, jitter_window: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            cap,
            jitter_window,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }

    pub fn with_max_retry_after(mut self, ceiling: Duration) -> Self {
        self.max_retry_after = ceiling;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base(),
            config.backoff_cap(),
            config.jitter_window(),
        )
        .with_max_retry_after(config.max_retry_after())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    pub fn jitter_window(&self) -> Duration {
        self.jitter_window
    }

    pub fn max_retry_after(&self) -> Duration {
        self.max_retry_after
    }

    /// Deterministic part of the delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exponent).min(self.cap)
    }

    fn jitter(&self) -> Duration {
        let window = u64::try_from(self.jitter_window.as_millis()).unwrap_or(u64::MAX);
        if window == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(fastrand::u64(0..=window))
    }

    /// Full delay before retry `retry`, honouring an optional server hint
    ///
    /// The hint is clamped to `max_retry_after`.
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let computed = self.backoff(retry) + self.jitter();
        match hint {
            Some(hint) => computed.max(hint.min(self.max_retry_after)),
            None => computed,
        }
    }

    /// True if the server asked for a longer pause than this policy waits
    pub fn exceeds_ceiling(&self, hint: Option<Duration>) -> bool {
        hint.is_some_and(|hint| hint > self.max_retry_after)
    }

    /// Transition taken after attempt number `attempt` produced `outcome`
    pub fn after_attempt(&self, attempt: u32, outcome: &FetchOutcome) -> RetryState {
        if !outcome.is_retryable() || attempt >= self.max_attempts {
            return RetryState::Finished;
        }
        if self.exceeds_ceiling(outcome.retry_after()) {
            return RetryState::Finished;
        }

        RetryState::Retrying {
            next_attempt: attempt + 1,
            delay: self.delay_for(attempt, outcome.retry_after()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
