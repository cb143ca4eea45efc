//! Gleaner main entry point
//!
//! This is the command-line interface for the Gleaner listing harvester.

use anyhow::{bail, Context};
use clap::Parser;
use gleaner::config::{load_config_with_hash, Config};
use gleaner::crawler::run_harvest;
use gleaner::output::{print_store_statistics, print_summary, ScopeStatistics};
use gleaner::storage::open_dedup_store;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Gleaner: an incremental listing harvester
///
/// Gleaner walks the paginated listing of a job board, picks up items it has
/// not committed before, fetches their detail pages and writes them to a CSV
/// artifact. Committed identifiers are remembered so the next run only sees
/// what is new.
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version = "1.0.0")]
#[command(about = "An incremental listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Source name or name/category label to harvest (random when omitted)
    #[arg(short, long, value_name = "NAME")]
    source: Option<String>,

    /// Only consider sources in this category
    #[arg(short, long, value_name = "CATEGORY")]
    category: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show identifier history sizes and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    // Flushes the log file when main returns
    let _log_guard = setup_logging(cli.verbose, cli.quiet, config.logging.file.as_deref())?;

    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        hash
    );

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, cli.source.as_deref(), cli.category.as_deref()).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// When `log_file` is set, records are appended to it as well as printed.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&str>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gleaner=info,warn"),
            1 => EnvFilter::new("gleaner=debug,info"),
            2 => EnvFilter::new("gleaner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file {}", path.display()))?;
            let directory = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            fs::create_dir_all(directory)
                .with_context(|| format!("Failed to create {}", directory.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Handles the --dry-run mode: shows the validated plan
fn handle_dry_run(config: &Config) {
    println!("=== Gleaner Dry Run ===\n");

    println!("Harvest:");
    println!("  Quota: {}", config.harvest.quota);
    println!(
        "  Stop after {} pages without new items",
        config.harvest.max_consecutive_empty_pages
    );
    println!("  Page size: {}", config.harvest.page_size);
    match config.harvest.max_pages {
        Some(cap) => println!("  Max pages: {}", cap),
        None => println!("  Max pages: unbounded"),
    }
    println!("  Detail workers: {}", config.harvest.workers);

    let pacing = &config.pacing;
    println!("\nPacing:");
    println!(
        "  Listing pause: {}-{}ms",
        pacing.page_pause_ms.min_ms, pacing.page_pause_ms.max_ms
    );
    println!(
        "  Detail pause: {}-{}ms",
        pacing.short_pause_ms.min_ms, pacing.short_pause_ms.max_ms
    );
    println!(
        "  Long pause: {}-{}ms every {} records",
        pacing.long_pause_ms.min_ms, pacing.long_pause_ms.max_ms, pacing.long_pause_every
    );
    println!(
        "  New session every {} fetches",
        pacing.rotate_session_every
    );
    println!(
        "  Attempts per item: {} (backoff {}ms)",
        pacing.max_attempts, pacing.retry_backoff_ms
    );

    println!("\nSession:");
    println!("  User agent: {}", config.session.user_agent);
    println!(
        "  Page load timeout: {}s",
        config.session.page_load_timeout_secs
    );

    println!("\nOutput directory: {}", config.output.directory);
    println!("Dedup backend: {:?}", config.dedup.backend);
    if let Some(file) = &config.logging.file {
        println!("Log file: {}", file);
    }

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} (scope {})", source.label(), source.scope());
        println!("    Entry: {}", source.entry_url());
        println!("    Listing: {}", source.listing_url);
        let fields: Vec<&str> = source.fields.iter().map(|f| f.name.as_str()).collect();
        println!("    Fields: {}", fields.join(", "));
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows per-scope identifier history sizes
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let scopes: BTreeSet<&str> = config.sources.iter().map(|s| s.scope()).collect();

    let mut stats = Vec::with_capacity(scopes.len());
    for scope in scopes {
        let mut store = open_dedup_store(&config.dedup, scope)
            .with_context(|| format!("Failed to open history for {}", scope))?;
        let identifiers = store
            .try_load()
            .with_context(|| format!("Failed to read history for {}", scope))?;
        stats.push(ScopeStatistics {
            scope: scope.to_string(),
            identifiers,
            location: store.location(),
        });
    }

    print_store_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    source: Option<&str>,
    category: Option<&str>,
) -> anyhow::Result<()> {
    let summary = match run_harvest(config, source, category).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    print_summary(&summary);

    if summary.flush.is_failure() {
        bail!(
            "identifier history for {} was not updated; committed items will be fetched again next run",
            summary.scope
        );
    }

    Ok(())
}
