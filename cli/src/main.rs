//! Pulsewatch CLI
//!
//! Live dashboard and exporter for the metrics event log written by Pulsewatch
//! producers.
//!
//! # Usage
//!
//! ```bash
//! pulsewatch --help
//! pulsewatch start 3
//! pulsewatch stats
//! pulsewatch logs 20
//! pulsewatch export stats.json
//! pulsewatch metrics --service order-service
//! ```

#![deny(unsafe_code)]

mod config;
mod dashboard;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use shared::aggregation::AggregationEngine;
use shared::config::AggregationConfig;
use shared::storage::FileEventLog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Pulsewatch CLI - live monitoring of the metrics event log
#[derive(Parser)]
#[command(name = "pulsewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding metrics.log
    #[arg(long, global = true, env = "PULSEWATCH_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Service name used as the exposition suffix
    #[arg(long, global = true, env = "PULSEWATCH_SERVICE")]
    service: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the live dashboard (default)
    Start {
        /// Refresh interval in seconds
        #[arg(default_value_t = DEFAULT_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
    /// Print the current statistics as JSON and exit
    Stats,
    /// Show the most recent records, newest first
    Logs {
        /// Number of records to show
        #[arg(default_value_t = 10)]
        count: usize,
    },
    /// Export the current statistics to a JSON file
    Export {
        /// Destination file
        #[arg(default_value = "metrics-export.json")]
        filename: PathBuf,
    },
    /// Replay the log into the standard service metrics and print the exposition text
    Metrics,
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.default_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?.with_overrides(cli.log_dir, cli.service);
    init_tracing(&config);

    let log_path = config.metrics_log_path();
    tracing::debug!(path = %log_path.display(), service = %config.service, "Configuration loaded");

    let log = FileEventLog::new_shared(log_path);
    let engine = AggregationEngine::new(log.clone(), AggregationConfig::default())?;
    let mut stdout = std::io::stdout();

    match cli.command.unwrap_or(Commands::Start {
        interval: DEFAULT_INTERVAL_SECS,
    }) {
        Commands::Start { interval } => {
            dashboard::run_loop(
                Arc::new(engine),
                Duration::from_secs(interval),
                &mut stdout,
                dashboard::shutdown_signal(),
            )
            .await?;
        }
        Commands::Stats => dashboard::write_stats(&engine, &mut stdout)?,
        Commands::Logs { count } => dashboard::write_logs(&engine, count, &mut stdout)?,
        Commands::Export { filename } => {
            let path = dashboard::export_snapshot(&engine, &filename)?;
            println!("Metrics exported to: {}", path.display());
        }
        Commands::Metrics => dashboard::write_exposition(&*log, &config.service, &mut stdout)?,
    }

    Ok(())
}
