use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for hltb-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub output: OutputConfig,
    /// Extra label synonyms (raw label -> canonical key)
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Range and pacing of the crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Base URL; page `id` is fetched from `<base-url>/<id>`
    pub base_url: String,

    /// First identifier; when absent the run resumes after the highest
    /// committed identifier
    #[serde(default)]
    pub start: Option<u64>,

    /// Number of identifiers to walk; when absent the crawl is open-ended
    /// and stops on the miss threshold
    #[serde(default)]
    pub count: Option<u64>,

    /// Worker pool size and in-flight request ceiling
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Consecutive misses that end an open-ended crawl
    #[serde(default = "default_miss_threshold")]
    pub miss_threshold: u64,

    /// Pause after each identifier (milliseconds)
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Random extra pause after each identifier, up to this many milliseconds
    #[serde(default = "default_politeness_jitter_ms")]
    pub politeness_jitter_ms: u64,

    /// Whether pages without any completion time are written
    #[serde(default = "default_true")]
    pub commit_empty: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            start: None,
            count: None,
            concurrency: default_concurrency(),
            miss_threshold: default_miss_threshold(),
            politeness_delay_ms: default_politeness_delay_ms(),
            politeness_jitter_ms: default_politeness_jitter_ms(),
            commit_empty: true,
        }
    }
}

impl CrawlConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn politeness_jitter(&self) -> Duration {
        Duration::from_millis(self.politeness_jitter_ms)
    }
}

/// Retry and backoff policy for page fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    /// Attempts per identifier, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds); doubles per retry
    pub backoff_base_ms: u64,

    /// Upper bound of the doubling delay (milliseconds)
    pub backoff_cap_ms: u64,

    /// Uniform random delay added on top of the backoff (milliseconds)
    pub jitter_window_ms: u64,

    /// Timeout of a single request (seconds)
    pub attempt_timeout_secs: u64,

    /// Longest `Retry-After` wait honoured (milliseconds); a rate-limited
    /// id asking for more is given up on
    pub max_retry_after_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 600,
            backoff_cap_ms: 30_000,
            jitter_window_ms: 400,
            attempt_timeout_secs: 30,
            max_retry_after_ms: 120_000,
        }
    }
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn jitter_window(&self) -> Duration {
        Duration::from_millis(self.jitter_window_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_millis(self.max_retry_after_ms)
    }
}

/// Request headers sent with every fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/126.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the CSV output file
    pub path: String,

    /// Resume from an existing output file (false truncates it)
    #[serde(default = "default_true")]
    pub resume: bool,
}

/// Log file configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// File that receives a copy of the log, without colors
    #[serde(default)]
    pub file: Option<String>,
}

fn default_concurrency() -> usize {
    8
}

fn default_miss_threshold() -> u64 {
    400
}

fn default_politeness_delay_ms() -> u64 {
    250
}

fn default_politeness_jitter_ms() -> u64 {
    350
}

fn default_true() -> bool {
    true
}
