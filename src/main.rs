use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;
mod db;
mod logging;
mod replay;
mod s3;
mod sync;
#[cfg(test)]
mod test_utils;

use crate::config::{Config, StateBackend};
use crate::db::PostgresWriter;
use crate::replay::BoxcarsDecoder;
use crate::s3::S3Storage;
use crate::sync::storage::{JsonFileStore, ProcessedStore, SqliteProcessedStore};
use crate::sync::{Scheduler, Synchronizer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.toml",
        global = true
    )]
    config: String,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the bucket and ingest new replays
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Show how many keys are processed and which are quarantined
    Status,
    /// Forget every processed key and failure count
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {:#}", cli.config, e);
            process::exit(1);
        }
    };

    let _log_guard = logging::init_logging(config.logging.as_ref(), cli.verbose)?;
    info!("Replay Ingest v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config);

    match cli.command {
        Commands::Run { once } => run_ingest(config, once).await,
        Commands::Status => show_status(config).await,
        Commands::Reset => reset_state(config).await,
    }
}

/// Open the processed-set store selected in the configuration
fn open_state(config: &Config) -> Result<Box<dyn ProcessedStore>> {
    let path = &config.ingest.state_path;
    let store: Box<dyn ProcessedStore> = match config.ingest.state_backend {
        StateBackend::Json => Box::new(JsonFileStore::new(path)),
        StateBackend::Sqlite => Box::new(
            SqliteProcessedStore::new(&path.to_string_lossy())
                .with_context(|| format!("Failed to open state database {}", path.display()))?,
        ),
    };
    Ok(store)
}

/// Run the ingest loop with real storage, decoder and database implementations
async fn run_ingest(config: Config, once: bool) -> Result<()> {
    let storage = S3Storage::new(&config.s3)
        .await
        .context("Failed to initialize bucket client")?;
    let writer = PostgresWriter::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    let state = open_state(&config)?;

    let interval = config.ingest.interval();
    let synchronizer = Synchronizer::new(storage, BoxcarsDecoder::new(), writer, state, config.ingest);
    let scheduler = Scheduler::new(synchronizer, interval);
    info!("Ingest initialized for bucket {}", config.s3.bucket);

    let ct = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(ct.clone()));

    let result = if once {
        scheduler.run_once(&ct).await.map(|report| {
            info!(
                "Single cycle finished: {} ingested, {} failed, {} quarantined",
                report.succeeded, report.failed, report.quarantined
            );
        })
    } else {
        scheduler.run(ct).await
    };

    if let Err(e) = result {
        error!("Ingest stopped: {}", e);
        process::exit(1);
    }

    Ok(())
}

/// Print processed and quarantined keys
async fn show_status(config: Config) -> Result<()> {
    let state = open_state(&config)?;
    let processed = state.load().await?;
    let failures = state.load_failures().await?;

    println!("State: {}", config.ingest.state_path.display());
    println!("Processed replays: {}", processed.len());

    match config.ingest.quarantine_after {
        Some(limit) => {
            let quarantined: Vec<_> = failures
                .iter()
                .filter(|(_, attempts)| **attempts >= limit)
                .collect();
            println!("Quarantined replays: {}", quarantined.len());
            for (key, attempts) in quarantined {
                println!("  {key} ({attempts} failed decodes)");
            }
        }
        None => println!("Quarantine disabled, failing replays are retried every cycle"),
    }

    Ok(())
}

/// Reset the processed set, so every replay in the bucket is ingested again
async fn reset_state(config: Config) -> Result<()> {
    let state = open_state(&config)?;

    warn!("Resetting processed-set state; every replay will be ingested again");
    state.clear().await?;
    info!("Processed-set state has been reset successfully");

    Ok(())
}

/// Cancel `ct` on Ctrl+C or SIGTERM. The item in flight finishes before exit.
async fn cancel_on_shutdown(ct: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, finishing current work"),
        _ = terminate => info!("Received SIGTERM, finishing current work"),
    }

    ct.cancel();
}
