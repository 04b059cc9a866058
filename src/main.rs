//! Ripple-Loop main entry point
//!
//! This is the command-line interface for the Ripple-Loop crawl pipeline.

use clap::Parser;
use ripple_loop::config::{load_config_with_hash, validate, Config};
use ripple_loop::crawler::crawl;
use ripple_loop::output::print_report;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Ripple-Loop: a cyclic crawl pipeline
///
/// Fetches the seed pages, follows every link it has not seen before, and
/// stops once nothing is left to fetch, the time limit passes, or Ctrl-C is
/// pressed.
#[derive(Parser, Debug)]
#[command(name = "ripple-loop")]
#[command(version)]
#[command(about = "A cyclic crawl pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed URL, replaces the configured seeds (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Stop after this many seconds, overriding the configuration
    #[arg(long, value_name = "SECONDS")]
    max_duration: Option<u64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    apply_overrides(&mut config, &cli)?;

    if config.crawler.seeds.is_empty() {
        return Err("no seed URLs: set crawler.seeds or pass --seed".into());
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_loop=info,warn"),
            1 => EnvFilter::new("ripple_loop=debug,info"),
            2 => EnvFilter::new("ripple_loop=trace,debug"),
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

/// Applies command-line overrides and re-validates the result
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.seeds.is_empty() {
        config.crawler.seeds = cli.seeds.clone();
    }
    if let Some(seconds) = cli.max_duration {
        config.crawler.max_duration_secs = Some(seconds);
    }
    validate(config)?;
    Ok(())
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Ripple-Loop Dry Run ===\n");

    println!("Pipeline:");
    println!("  Frontier capacity: {}", config.crawler.frontier_capacity);
    println!("  Overflow policy: {:?}", config.crawler.overflow_policy);
    if config.crawler.overflow_policy == ripple_loop::config::OverflowKind::BlockFor {
        println!("  Overflow wait: {}ms", config.crawler.overflow_wait_ms);
    }
    println!(
        "  Page channel capacity: {}",
        config.crawler.page_channel_capacity
    );
    println!(
        "  Discovery channel capacity: {}",
        config.crawler.discovery_channel_capacity
    );
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Resolver: {:?}", config.crawler.resolver);
    match config.crawler.max_duration_secs {
        Some(seconds) => println!("  Max duration: {}s", seconds),
        None => println!("  Max duration: until quiescent"),
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            on_interrupt.cancel();
        }
    });

    tracing::info!("Total seed URLs: {}", config.crawler.seeds.len());

    match crawl(config, cancel).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
