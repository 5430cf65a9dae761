// ABOUTME: CLI entry point for dmml-replicator
// ABOUTME: Parses commands and routes to the run and check handlers

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dmml_replicator::config::{self, ConfigOverrides, FileConfig};
use dmml_replicator::dmml::{self, DmmlError};
use dmml_replicator::{SyncAgent, SyncStats};

#[derive(Parser)]
#[command(name = "dmml-replicator")]
#[command(about = "Timestamp-driven table replication driven by DMML mapping files", long_about = None)]
#[command(version)]
struct Cli {
    /// Allow self-signed TLS certificates (insecure - use only for testing)
    #[arg(
        long = "allow-self-signed-certs",
        global = true,
        default_value_t = false
    )]
    allow_self_signed_certs: bool,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate mapped tables from source to target
    ///
    /// Runs one pass immediately, then repeats every --interval seconds until
    /// Ctrl+C (or exits after the first pass with --once).
    Run {
        /// Path to a TOML config file; command-line flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Source database URL (sqlite://, mysql://, postgres://)
        #[arg(long, env = "DMML_SOURCE_URL")]
        source: Option<String>,
        /// Target database URL (sqlite://, mysql://, postgres://)
        #[arg(long, env = "DMML_TARGET_URL")]
        target: Option<String>,
        /// DMML mapping file
        #[arg(long)]
        mapping: Option<PathBuf>,
        /// Seconds between passes (default: 30)
        #[arg(long)]
        interval: Option<u64>,
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },
    /// Validate a DMML mapping file and print its table maps
    Check {
        /// DMML mapping file
        #[arg(long)]
        mapping: PathBuf,
        /// Print the parsed mapping as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log flag otherwise
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            source,
            target,
            mapping,
            interval,
            once,
        } => {
            let overrides = ConfigOverrides {
                source_url: source,
                destination_url: target,
                mapping_path: mapping,
                sync_interval_secs: interval,
                allow_self_signed_certs: cli.allow_self_signed_certs,
            };
            run(config, overrides, once).await
        }
        Commands::Check { mapping, json } => check(&mapping, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn check(mapping: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let map = match dmml::parse_file(mapping) {
        Ok(map) => map,
        Err(e @ DmmlError::FileNotFound { .. }) => return Err(e.into()),
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!(
                "{} is not a valid mapping file",
                mapping.display()
            )))
        }
    };

    if json {
        let output =
            serde_json::to_string_pretty(&map).context("Failed to serialize mapping")?;
        println!("{}", output);
        return Ok(());
    }

    println!("✓ {} is valid ({} table maps)", mapping.display(), map.len());
    for table in map.table_maps() {
        println!("  {}", dmml::describe_table(table));
    }
    Ok(())
}

async fn run(
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
    once: bool,
) -> anyhow::Result<()> {
    let file = config_path
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = config::resolve(file, overrides)?;
    let interval = config.sync_interval;

    let mut agent = SyncAgent::from_config(config)?;
    agent.connect().await?;

    // Disconnect even when syncing fails
    let outcome = sync_until_stopped(&mut agent, interval, once).await;
    let disconnected = agent.disconnect().await;
    outcome?;
    disconnected
}

async fn sync_until_stopped(
    agent: &mut SyncAgent,
    interval: std::time::Duration,
    once: bool,
) -> anyhow::Result<()> {
    let stats = agent.sync().await?;
    report(&stats);

    if once {
        return Ok(());
    }

    println!();
    println!("========================================");
    println!("Starting live sync");
    println!("========================================");
    println!("  Sync interval: {}s", interval.as_secs());
    println!("  Press Ctrl+C to stop");
    println!();

    agent.live_sync(interval).await?;

    let signal = tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C");
    if signal.is_ok() {
        tracing::info!("Received shutdown signal");
    }

    agent.stop_sync();
    let passes = agent.hold().await?;
    println!("Live sync stopped after {} passes", passes);
    signal
}

fn report(stats: &SyncStats) {
    println!(
        "Synced {} tables, {} rows in {}ms",
        stats.tables_synced, stats.rows_synced, stats.duration_ms
    );
    if stats.tables_failed > 0 || stats.rows_failed > 0 {
        println!(
            "  {} tables and {} rows failed",
            stats.tables_failed, stats.rows_failed
        );
    }
    for error in &stats.errors {
        println!("  ✗ {}", error);
    }
}
