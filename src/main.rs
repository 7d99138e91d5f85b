//! Lead-Ripple main entry point
//!
//! This is the command-line interface for the Lead-Ripple record enricher.

use anyhow::Context;
use clap::Parser;
use lead_ripple::config::{load_config_with_hash, Config};
use lead_ripple::crawler::{run_enrichment, RunOptions};
use lead_ripple::output::print_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Lead-Ripple: a bounded, polite business-record enricher
///
/// Lead-Ripple reads business records from a CSV file, visits each
/// record's website under a strict per-record budget, and appends the
/// enriched rows to an output CSV that can be resumed at any time.
#[derive(Parser, Debug)]
#[command(name = "lead-ripple")]
#[command(version)]
#[command(about = "A bounded, polite business-record enricher", long_about = None)]
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

    /// Process at most this many input rows
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Start at this 0-based input row index (overrides resume)
    #[arg(long, value_name = "N")]
    resume_from: Option<usize>,

    /// Do not skip rows already present in the output file
    #[arg(long, conflicts_with = "resume_from")]
    no_resume: bool,

    /// Enrich records on the main runtime instead of isolated workers
    #[arg(long)]
    no_isolation: bool,

    /// Validate config and show what would be run without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.no_isolation {
        config.enrich.isolation = false;
    }

    let options = RunOptions {
        limit: cli.limit.filter(|n| *n > 0),
        resume_from: cli.resume_from,
        resume: !cli.no_resume,
    };

    if cli.dry_run {
        handle_dry_run(&config, &options);
        return Ok(());
    }

    let summary = run_enrichment(config, config_hash, options)
        .await
        .context("enrichment run failed")?;

    if !cli.quiet {
        print_summary(&summary.stats, summary.interrupted);
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lead_ripple=info,warn"),
            1 => EnvFilter::new("lead_ripple=debug,info"),
            2 => EnvFilter::new("lead_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config, options: &RunOptions) {
    println!("=== Lead-Ripple Dry Run ===\n");

    println!("Enrichment:");
    println!(
        "  Max fetches per record: {}",
        config.enrich.max_fetches_per_record
    );
    println!(
        "  Record deadline: {}s (hard timeout {}s)",
        config.enrich.record_deadline_secs,
        config.enrich.hard_timeout().as_secs()
    );
    println!("  Throttle: {}ms", config.enrich.throttle_ms);
    println!("  Workers: {}", config.enrich.workers);
    println!("  Isolation: {}", config.enrich.isolation);

    println!("\nFetcher:");
    println!(
        "  Timeouts: connect {}s, request {}s",
        config.fetcher.connect_timeout_secs, config.fetcher.request_timeout_secs
    );
    println!("  Max body: {} bytes", config.fetcher.max_body_bytes);
    println!(
        "  Retries: {} (base backoff {}ms)",
        config.fetcher.max_retries, config.fetcher.retry_backoff_ms
    );

    println!("\nHost Breaker:");
    println!(
        "  Opens after {} failures for {}s",
        config.breaker.failure_threshold, config.breaker.cooldown_secs
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nFiles:");
    println!("  Input: {}", config.io.input_path);
    println!("  Output: {}", config.io.output_path);
    println!("  Status: {}", config.io.status_path);

    println!("\nEmail Policy:");
    println!("  Role prefixes: {}", config.email_policy.role_prefixes.join(", "));
    println!("  Free domains: {}", config.email_policy.free_domains.len());
    println!("  Max emails: {}", config.email_policy.max_emails);

    println!("\n✓ Configuration is valid");
    match (options.resume_from, options.resume) {
        (Some(index), _) => println!("✓ Would start at input row {}", index),
        (None, true) => println!("✓ Would resume after rows already in the output"),
        (None, false) => println!("✓ Would start at the first input row"),
    }
    if let Some(limit) = options.limit {
        println!("✓ Would stop after {} rows", limit);
    }
}
