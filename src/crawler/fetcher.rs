//! HTTP fetcher implementation
//!
//! This module handles every request the harvester makes, including:
//! - Building the HTTP client with the configured identity headers
//! - Classifying each response into a `FetchOutcome`
//! - Folding retried attempts into one terminal outcome per identifier
//! - Bounding the number of requests in flight

use crate::config::{Config, HttpConfig};
use crate::crawler::retry::{RetryPolicy, RetryState};
use crate::Identifier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result of one fetch attempt, or of a whole retried fetch
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// 2xx with a non-empty body
    Success {
        /// Decoded page body
        body: String,
        /// HTTP status code
        status: u16,
    },

    /// The server says the page does not exist (404 / 410)
    NotFound,

    /// 429 / 503, with the server's `Retry-After` hint if it sent one
    RateLimited { retry_after: Option<Duration> },

    /// Timeouts, connection resets, 5xx and other recoverable failures
    TransientError(String),

    /// Responses that retrying will not fix
    FatalError(String),
}

impl FetchOutcome {
    /// Returns true if the retry policy may try again after this outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::TransientError(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { status, body } => write!(f, "HTTP {} ({} bytes)", status, body.len()),
            Self::NotFound => f.write_str("not found"),
            Self::RateLimited {
                retry_after: Some(after),
            } => write!(f, "rate limited (retry after {:?})", after),
            Self::RateLimited { retry_after: None } => f.write_str("rate limited"),
            Self::TransientError(cause) => write!(f, "transient error: {}", cause),
            Self::FatalError(cause) => write!(f, "fatal error: {}", cause),
        }
    }
}

/// A single request/response exchange for one identifier
///
/// `HttpTransport` is the real implementation; tests substitute doubles
/// that count calls and in-flight requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs exactly one attempt and classifies its result
    async fn attempt(&self, id: Identifier, url: &Url) -> FetchOutcome;
}

/// Builds an HTTP client with the configured identity
///
/// # Arguments
///
/// * `config` - User agent and language headers
/// * `timeout` - Whole-request timeout for one attempt
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use hltb_harvest::config::HttpConfig;
/// use hltb_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&HttpConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&config.accept_language) {
        Ok(value) => {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        Err(_) => {
            tracing::warn!(
                "Ignoring invalid Accept-Language value {:?}",
                config.accept_language
            );
        }
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport backed by a shared reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config, timeout)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    /// # Classification
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | HTTP 404, 410 | NotFound |
    /// | HTTP 429, 503 | RateLimited (with Retry-After) |
    /// | HTTP 408, other 5xx | TransientError |
    /// | Timeout, connection error | TransientError |
    /// | 2xx with empty body | TransientError |
    /// | Other 3xx/4xx | FatalError |
    /// | Redirect loop, bad request setup | FatalError |
    async fn attempt(&self, id: Identifier, url: &Url) -> FetchOutcome {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Request for id {} failed: {}", id, e);
                return classify_error(&e);
            }
        };

        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return FetchOutcome::NotFound;
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return FetchOutcome::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            };
        }

        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            return FetchOutcome::TransientError(format!("HTTP {}", status.as_u16()));
        }

        if !status.is_success() {
            return FetchOutcome::FatalError(format!("unexpected HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) if body.trim().is_empty() => {
                FetchOutcome::TransientError("empty response body".to_string())
            }
            Ok(body) => FetchOutcome::Success {
                body,
                status: status.as_u16(),
            },
            Err(e) => FetchOutcome::TransientError(format!("failed to read body: {}", e)),
        }
    }
}

fn classify_error(error: &reqwest::Error) -> FetchOutcome {
    if error.is_builder() || error.is_redirect() {
        FetchOutcome::FatalError(error.to_string())
    } else if error.is_timeout() {
        FetchOutcome::TransientError("request timeout".to_string())
    } else if error.is_connect() {
        FetchOutcome::TransientError(format!("connection failed: {}", error))
    } else {
        FetchOutcome::TransientError(error.to_string())
    }
}

/// Reads `Retry-After` as either delta-seconds or an HTTP date
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let when = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = when.with_timezone(&Utc) - Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Every attempt made for one identifier, folded into one outcome
#[derive(Debug, Clone)]
pub struct FetchTrace {
    pub outcome: FetchOutcome,
    pub attempts: u32,
    /// Backoff delays slept before each retry, in order
    pub delays: Vec<Duration>,
}

/// Retrying, concurrency-limited fetcher shared by all workers
///
/// The semaphore slot is held only for the duration of one attempt, never
/// across a backoff sleep.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    limiter: Arc<Semaphore>,
    attempt_timeout: Duration,
    cancel: CancellationToken,
}

impl Fetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `transport` - Performs single attempts
    /// * `policy` - Retry and backoff policy
    /// * `concurrency` - Maximum attempts in flight at once
    /// * `attempt_timeout` - Upper bound on one attempt
    /// * `cancel` - Cuts backoff sleeps short when tripped
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        concurrency: usize,
        attempt_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            policy,
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
            attempt_timeout,
            cancel,
        }
    }

    pub fn from_config(
        transport: Arc<dyn Transport>,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(
            transport,
            RetryPolicy::from_config(&config.retry),
            config.crawl.concurrency,
            config.retry.attempt_timeout(),
            cancel,
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches one identifier, retrying as the policy allows
    pub async fn fetch(&self, id: Identifier, url: &Url) -> FetchOutcome {
        self.fetch_with_trace(id, url).await.outcome
    }

    /// Like [`fetch`](Self::fetch), also reporting attempts and delays
    pub async fn fetch_with_trace(&self, id: Identifier, url: &Url) -> FetchTrace {
        let mut state = RetryState::Pending;
        let mut last: Option<FetchOutcome> = None;
        let mut attempts = 0;
        let mut delays = Vec::new();

        loop {
            state = match state {
                RetryState::Pending => RetryState::Attempting(1),

                RetryState::Attempting(attempt) => {
                    attempts = attempt;
                    let outcome = self.attempt_once(id, url).await;
                    let next = self.policy.after_attempt(attempt, &outcome);
                    if self.policy.exceeds_ceiling(outcome.retry_after()) {
                        tracing::warn!(
                            "Id {} asked to wait {:?}, over the {:?} limit; not retrying",
                            id,
                            outcome.retry_after().unwrap_or_default(),
                            self.policy.max_retry_after()
                        );
                    }
                    last = Some(outcome);
                    next
                }

                RetryState::Retrying {
                    next_attempt,
                    delay,
                } => {
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    tracing::debug!(
                        target: "hltb_harvest::events",
                        event = "fetch_retry",
                        id,
                        attempt = next_attempt,
                        delay_ms,
                        reason = %last.as_ref().map(|o| o.to_string()).unwrap_or_default(),
                    );
                    delays.push(delay);

                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            tracing::debug!("Retry for id {} abandoned on cancellation", id);
                            RetryState::Finished
                        }
                        _ = tokio::time::sleep(delay) => RetryState::Attempting(next_attempt),
                    }
                }

                RetryState::Finished => break,
            };
        }

        FetchTrace {
            outcome: last
                .unwrap_or_else(|| FetchOutcome::FatalError("no attempt was made".to_string())),
            attempts,
            delays,
        }
    }

    async fn attempt_once(&self, id: Identifier, url: &Url) -> FetchOutcome {
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return FetchOutcome::FatalError("request limiter closed".to_string()),
        };

        match tokio::time::timeout(self.attempt_timeout, self.transport.attempt(id, url)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::TransientError(format!(
                "attempt exceeded {:?} timeout",
                self.attempt_timeout
            )),
        }
    }
}
