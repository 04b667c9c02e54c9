//! Harvest coordinator - main run orchestration logic
//!
//! This module wires the pipeline together:
//! - Opening the output and deriving the commit ledger
//! - Choosing the start identifier
//! - Running a fixed pool of workers, each doing fetch, extract and commit
//!   for one identifier at a time
//! - Halting the whole run on a storage error
//! - Collecting the run summary

use crate::config::{validate, Config};
use crate::crawler::endpoint::Endpoint;
use crate::crawler::fetcher::{FetchOutcome, Fetcher, HttpTransport, Transport};
use crate::crawler::scheduler::{Dispatch, IdRange, Scheduler};
use crate::extract::{Extractor, FailureReason, LabelVocabulary, Page, Record};
use crate::output::RunSummary;
use crate::state::IdOutcome;
use crate::storage::{open_output, CommitLedger, Sink, StorageError};
use crate::{ConfigError, HarvestError, Identifier};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// State shared by every worker of a run
struct Pipeline {
    endpoint: Endpoint,
    fetcher: Fetcher,
    extractor: Extractor,
    sink: Arc<dyn Sink>,
    ledger: Arc<CommitLedger>,
    commit_empty: bool,
    politeness_delay: Duration,
    politeness_jitter: Duration,
    cancel: CancellationToken,
}

/// Main harvest coordinator
pub struct Coordinator {
    config: Config,
    pipeline: Arc<Pipeline>,
    start: Identifier,
}

impl Coordinator {
    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `cancel` - Token that stops the run when tripped
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Configuration valid and output opened
    /// * `Err(HarvestError)` - Invalid configuration or unusable output
    pub fn new(config: Config, cancel: CancellationToken) -> crate::Result<Self> {
        validate(&config)?;
        let transport = HttpTransport::new(&config.http, config.retry.attempt_timeout())?;
        Self::with_transport(config, Arc::new(transport), cancel)
    }

    /// Creates a coordinator with a custom transport, writing to the
    /// configured CSV output
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        validate(&config)?;
        let (sink, ledger) = open_output(Path::new(&config.output.path), config.output.resume)?;
        tracing::info!(
            "Output {} holds {} committed ids",
            sink.path().display(),
            ledger.len()
        );
        Self::with_parts(config, transport, Arc::new(sink), ledger, cancel)
    }

    /// Creates a coordinator from already-built parts
    ///
    /// `ledger` must describe exactly the rows `sink` already holds.
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn Sink>,
        ledger: CommitLedger,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        validate(&config)?;

        let endpoint = Endpoint::new(&config.crawl.base_url)?;
        let vocabulary = LabelVocabulary::with_synonyms(&config.labels)?;

        let start = match (config.crawl.start, ledger.max_id()) {
            (Some(start), _) => start,
            (None, None) => 1,
            (None, Some(max)) => max.checked_add(1).ok_or_else(|| {
                ConfigError::Validation(format!("output already holds the last identifier {}", max))
            })?,
        };
        if let Some(count) = config.crawl.count {
            if start.checked_add(count).is_none() {
                return Err(ConfigError::Validation(format!(
                    "range start={} count={} overflows",
                    start, count
                ))
                .into());
            }
        }

        let pipeline = Pipeline {
            endpoint,
            fetcher: Fetcher::from_config(transport, &config, cancel.clone()),
            extractor: Extractor::new(vocabulary),
            sink,
            ledger: Arc::new(ledger),
            commit_empty: config.crawl.commit_empty,
            politeness_delay: config.crawl.politeness_delay(),
            politeness_jitter: config.crawl.politeness_jitter(),
            cancel,
        };

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            start,
        })
    }

    /// First identifier this run will generate
    pub fn start(&self) -> Identifier {
        self.start
    }

    pub fn ledger(&self) -> &CommitLedger {
        &self.pipeline.ledger
    }

    /// Runs the harvest until the range is exhausted, the miss threshold
    /// is hit, or the run is cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Every dispatched identifier reached a terminal
    ///   outcome
    /// * `Err(HarvestError)` - A storage error halted the run; rows already
    ///   committed stay valid for a resume
    pub async fn run(&self) -> crate::Result<RunSummary> {
        let ids = IdRange::new(self.start, self.config.crawl.count);
        let concurrency = self.config.crawl.concurrency;

        tracing::info!(
            "Harvesting ids {} from {} with {} workers ({} already committed)",
            ids,
            self.pipeline.endpoint.base(),
            concurrency,
            self.pipeline.ledger.len()
        );

        let scheduler = Arc::new(Scheduler::new(
            ids,
            Arc::clone(&self.pipeline.ledger),
            self.config.crawl.miss_threshold,
            self.pipeline.cancel.clone(),
        ));

        let started = Instant::now();
        let mut workers = JoinSet::new();
        for worker in 0..concurrency {
            let pipeline = Arc::clone(&self.pipeline);
            let scheduler = Arc::clone(&scheduler);
            workers.spawn(async move { pipeline.work(worker, &scheduler).await });
        }

        let mut summary = RunSummary::default();
        let mut failure: Option<HarvestError> = None;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(partial)) => summary.merge(&partial),
                Ok(Err(e)) => {
                    self.pipeline.cancel.cancel();
                    failure.get_or_insert(HarvestError::Storage(e));
                }
                Err(e) => {
                    self.pipeline.cancel.cancel();
                    failure.get_or_insert(HarvestError::Worker(e.to_string()));
                }
            }
        }

        if let Some(e) = failure {
            tracing::error!("Harvest halted: {}", e);
            return Err(e);
        }

        summary.cancelled = self.pipeline.cancel.is_cancelled();
        summary.miss_limit_reached = scheduler.miss_limit_reached();
        summary.elapsed = started.elapsed();

        tracing::info!(
            "Harvest finished: {} committed, {} skipped, {} not found, {} failed, {} extraction errors in {:?}",
            summary.committed,
            summary.skipped_existing + summary.skipped_empty,
            summary.not_found,
            summary.failed,
            summary.errors,
            summary.elapsed
        );

        Ok(summary)
    }
}

impl Pipeline {
    /// One worker: pull, process, pause, repeat
    async fn work(&self, worker: usize, scheduler: &Scheduler) -> Result<RunSummary, StorageError> {
        let mut summary = RunSummary::default();

        while let Some(dispatch) = scheduler.next() {
            let id = match dispatch {
                Dispatch::AlreadyCommitted(id) => {
                    emit(id, IdOutcome::SkippedExisting, "already in output");
                    summary.record(IdOutcome::SkippedExisting);
                    continue;
                }
                Dispatch::Fetch(id) => id,
            };

            let outcome = match self.process(id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Worker {} failed to commit id {}: {}", worker, id, e);
                    self.cancel.cancel();
                    return Err(e);
                }
            };

            scheduler.observe(outcome);
            summary.record(outcome);

            let pause = self.politeness_pause();
            if !pause.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        tracing::debug!("Worker {} done after {} ids", worker, summary.total());
        Ok(summary)
    }

    /// Fetch, extract and commit one identifier
    ///
    /// Only storage errors escape; everything else becomes an outcome.
    async fn process(&self, id: Identifier) -> Result<IdOutcome, StorageError> {
        let url = match self.endpoint.url_for(id) {
            Ok(url) => url,
            Err(e) => {
                emit(id, IdOutcome::Failed, &format!("invalid url: {}", e));
                return Ok(IdOutcome::Failed);
            }
        };

        let body = match self.fetcher.fetch(id, &url).await {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::NotFound => {
                emit(id, IdOutcome::NotFound, "server reported not found");
                return Ok(IdOutcome::NotFound);
            }
            other => {
                emit(id, IdOutcome::Failed, &other.to_string());
                return Ok(IdOutcome::Failed);
            }
        };

        let page = Page {
            id,
            url: url.as_str(),
            body: &body,
        };

        let record = match self.extractor.extract(&page) {
            Ok(record) => record,
            Err(failure) if failure.reason == FailureReason::NoSuchPage => {
                emit(id, IdOutcome::NotFound, &failure.to_string());
                return Ok(IdOutcome::NotFound);
            }
            Err(failure) => {
                emit(id, IdOutcome::ExtractionFailed, &failure.to_string());
                return Ok(IdOutcome::ExtractionFailed);
            }
        };

        if record.completion_times.is_empty() && !self.commit_empty {
            emit(id, IdOutcome::SkippedEmpty, &record.title);
            return Ok(IdOutcome::SkippedEmpty);
        }

        let title = record.title.clone();
        self.commit(record).await?;
        emit(id, IdOutcome::Committed, &title);
        Ok(IdOutcome::Committed)
    }

    /// Appends the row, then marks the ledger
    async fn commit(&self, record: Record) -> Result<(), StorageError> {
        let id = record.id;
        let sink = Arc::clone(&self.sink);

        tokio::task::spawn_blocking(move || sink.append(&record))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        self.ledger.mark_committed(id);
        Ok(())
    }

    fn politeness_pause(&self) -> Duration {
        let jitter_ms = u64::try_from(self.politeness_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        };
        self.politeness_delay + jitter
    }
}

/// Emits the structured event for a terminal outcome
fn emit(id: Identifier, outcome: IdOutcome, detail: &str) {
    let event = outcome.event_name();
    match outcome {
        IdOutcome::Committed => {
            tracing::info!(target: "hltb_harvest::events", event, id, "{}", detail)
        }
        IdOutcome::SkippedExisting | IdOutcome::SkippedEmpty | IdOutcome::NotFound => {
            tracing::debug!(target: "hltb_harvest::events", event, id, "{}", detail)
        }
        IdOutcome::Failed | IdOutcome::ExtractionFailed => {
            tracing::warn!(target: "hltb_harvest::events", event, id, "{}", detail)
        }
    }
}

/// Runs a complete harvest with a fresh cancellation token
pub async fn run_harvest(config: Config) -> crate::Result<RunSummary> {
    let coordinator = Coordinator::new(config, CancellationToken::new())?;
    coordinator.run().await
}
