//! hltb-harvest main entry point
//!
//! This is the command-line interface for the hltb-harvest page crawler.

use anyhow::Context;
use clap::Parser;
use hltb_harvest::config::{load_config_with_hash, validate, Config, LoggingConfig};
use hltb_harvest::crawler::{Coordinator, RetryPolicy};
use hltb_harvest::output::{
    load_statistics, print_split_report, print_statistics, print_summary, split_dataset,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// hltb-harvest: a resumable crawler for numbered game pages
///
/// Walks a range of page identifiers, extracts completion times and
/// release dates, and appends one CSV row per game. Re-running with the
/// same output resumes where the previous run stopped.
#[derive(Parser, Debug)]
#[command(name = "hltb-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable crawler for numbered game pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// First identifier to fetch (default: one past the highest in the output)
    #[arg(long)]
    start: Option<u64>,

    /// Number of identifiers to walk, or '*' to run until the miss threshold
    #[arg(long, value_parser = parse_count_arg)]
    count: Option<CountArg>,

    /// Number of concurrent workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Output CSV path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Truncate the output and start with an empty ledger
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long, conflicts_with_all = ["stats", "split"])]
    dry_run: bool,

    /// Show statistics from the output file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "split"])]
    stats: bool,

    /// Export rows with completion times, split by content type, into DIR
    #[arg(long, value_name = "DIR", conflicts_with_all = ["dry_run", "stats"])]
    split: Option<PathBuf>,
}

/// Value of `--count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountArg {
    Bounded(u64),
    Open,
}

fn parse_count_arg(raw: &str) -> Result<CountArg, String> {
    if raw.trim() == "*" {
        return Ok(CountArg::Open);
    }
    raw.trim()
        .parse::<u64>()
        .map(CountArg::Bounded)
        .map_err(|_| format!("expected a number or '*', got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first so logging can honour [logging]
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, &config.logging)?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    apply_overrides(&mut config, &cli);
    validate(&config).context("Invalid configuration after command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(dir) = &cli.split {
        handle_split(&config, dir)?;
    } else {
        handle_harvest(config).await?;
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(start) = cli.start {
        config.crawl.start = Some(start);
    }
    match cli.count {
        Some(CountArg::Bounded(count)) => config.crawl.count = Some(count),
        Some(CountArg::Open) => config.crawl.count = None,
        None => {}
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawl.concurrency = concurrency;
    }
    if let Some(output) = &cli.output {
        config.output.path = output.to_string_lossy().into_owned();
    }
    if cli.fresh {
        config.output.resume = false;
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool, logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("hltb_harvest=info,warn"),
            1 => EnvFilter::new("hltb_harvest=debug,info"),
            2 => EnvFilter::new("hltb_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let file = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file path {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // Keep the background writer alive for the whole process
            std::mem::forget(guard);

            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

/// Handles the --dry-run mode: shows the effective run without fetching
fn handle_dry_run(config: &Config) {
    println!("=== hltb-harvest Dry Run ===\n");

    println!("Range:");
    println!("  Base URL: {}", config.crawl.base_url);
    match config.crawl.start {
        Some(start) => println!("  Start: {}", start),
        None => println!("  Start: one past the highest id in the output"),
    }
    match config.crawl.count {
        Some(count) => println!("  Count: {}", count),
        None => println!(
            "  Count: open-ended (stop after {} consecutive misses)",
            config.crawl.miss_threshold
        ),
    }

    println!("\nWorkers:");
    println!("  Concurrency: {}", config.crawl.concurrency);
    println!(
        "  Politeness delay: {}ms + up to {}ms",
        config.crawl.politeness_delay_ms, config.crawl.politeness_jitter_ms
    );
    println!("  Commit empty records: {}", config.crawl.commit_empty);

    let policy = RetryPolicy::from_config(&config.retry);
    println!("\nRetry Policy:");
    println!("  Max attempts: {}", policy.max_attempts());
    let delays: Vec<String> = (1..policy.max_attempts())
        .map(|retry| format!("{:?}", policy.backoff(retry)))
        .collect();
    println!("  Backoff before retries: [{}]", delays.join(", "));
    println!("  Jitter window: {:?}", policy.jitter_window());
    println!("  Longest Retry-After honoured: {:?}", policy.max_retry_after());
    println!("  Attempt timeout: {:?}", config.retry.attempt_timeout());

    println!("\nOutput:");
    println!("  Path: {}", config.output.path);
    println!(
        "  Mode: {}",
        if config.output.resume {
            "resume"
        } else {
            "fresh (existing file is truncated)"
        }
    );
    if !config.labels.is_empty() {
        println!("  Extra label synonyms: {}", config.labels.len());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the output file
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Output: {}\n", config.output.path);

    let stats = load_statistics(Path::new(&config.output.path))
        .with_context(|| format!("Failed to read {}", config.output.path))?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --split mode: exports the filtered dataset
fn handle_split(config: &Config, dir: &Path) -> anyhow::Result<()> {
    let report = split_dataset(Path::new(&config.output.path), dir)
        .with_context(|| format!("Failed to export {}", config.output.path))?;
    print_split_report(&report);

    println!("\n✓ Export written to: {}", dir.display());
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    if config.output.resume {
        tracing::info!("Starting harvest (resuming from existing output if present)");
    } else {
        tracing::info!("Starting fresh harvest (truncating existing output)");
    }

    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(config, cancel.clone())?;

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight ids");
            interrupt.cancel();
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
