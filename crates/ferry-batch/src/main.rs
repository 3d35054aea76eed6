//! Ferry Batch - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use ferry_common::logging::{init_logging, LogConfig, LogLevel};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info, warn};

use ferry_batch::{
    app::App,
    config::{Config, Profile},
    job::BatchStatus,
};

#[derive(Parser)]
#[command(name = "ferry-batch", version, about = "Chunked loader for delimited files")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the listener for the configured profile and run until interrupted
    Run,
    /// Process a single local file and exit
    Process {
        /// File to load
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .log_file_prefix("ferry-batch")
        .filter_directives("ferry_batch=debug,ferry_common=info,sqlx=warn,aws_config=warn")
        .build();

    // environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    let result = match cli.command {
        Command::Run => run().await,
        Command::Process { file } => process_file(file).await,
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::load()?;
    info!(profile = ?config.profile, job = %config.job.name, "Starting ferry-batch");

    let app = App::from_config(config).await?;
    let mut listener = app.start_listener()?;

    tokio::select! {
        _ = shutdown_signal() => {},
        // the listener only exits on its own when it cannot continue
        _ = listener.exited() => warn!(listener = listener.name(), "Listener exited"),
    }

    listener.shutdown().await?;
    info!("ferry-batch stopped");
    Ok(())
}

async fn process_file(file: PathBuf) -> Result<()> {
    let mut config = Config::load()?;
    config.profile = Profile::Filesystem;
    config.validate()?;

    let app = App::from_config(config).await?;
    let execution = app.process_file(&file).await?;

    match execution.status() {
        BatchStatus::Completed => {
            info!(execution_id = execution.id(), "File processed");
            Ok(())
        },
        status => anyhow::bail!(
            "run {} ended {}: {}",
            execution.id(),
            status,
            execution.exit_description().unwrap_or_default()
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
