use crate::config::types::{Config, CrawlConfig, HttpConfig, OutputConfig, RetryConfig};
use crate::extract::LabelVocabulary;
use crate::ConfigError;
use url::Url;

/// Largest accepted worker pool
pub const MAX_CONCURRENCY: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_retry_config(&config.retry)?;
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    LabelVocabulary::with_synonyms(&config.labels)?;
    Ok(())
}

/// Validates the crawl range and pacing
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' cannot carry a query or fragment",
            config.base_url
        )));
    }

    if config.start == Some(0) {
        return Err(ConfigError::Validation(
            "start must be a positive identifier".to_string(),
        ));
    }

    if config.count == Some(0) {
        return Err(ConfigError::Validation(
            "count must be at least 1 (omit it for an open-ended crawl)".to_string(),
        ));
    }

    if let (Some(start), Some(count)) = (config.start, config.count) {
        if start.checked_add(count).is_none() {
            return Err(ConfigError::Validation(format!(
                "range start={} count={} overflows",
                start, count
            )));
        }
    }

    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.miss_threshold < 1 {
        return Err(ConfigError::Validation(
            "miss-threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.backoff_base_ms > config.backoff_cap_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms ({}) cannot exceed backoff-cap-ms ({})",
            config.backoff_base_ms, config.backoff_cap_ms
        )));
    }

    if config.attempt_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "attempt-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates request headers
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if !config.user_agent.is_ascii() || config.user_agent.contains(['\r', '\n']) {
        return Err(ConfigError::Validation(format!(
            "user-agent must be a single line of ASCII, got '{}'",
            config.user_agent
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
