//! ITSDW Ingest - full refresh of the ITS academic data warehouse

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use itsdw_common::logging::{init_logging, LogConfig, LogLevel};
use itsdw_ingest::config::IngestConfig;
use itsdw_ingest::pipeline::{reset_only, run_pipeline};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "itsdw-ingest")]
#[command(author, version, about = "Load ITS academic records into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop and recreate every table, then load everything (default)
    Run(RunArgs),

    /// Drop and recreate every table without loading data
    Reset,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// First academic year to pull enrollments for
    #[arg(long)]
    start_year: Option<i32>,

    /// Last academic year to pull enrollments for
    #[arg(long)]
    end_year: Option<i32>,

    /// Delay between paced API calls, in milliseconds
    #[arg(long)]
    pacing_ms: Option<u64>,
}

fn load_config(args: &RunArgs) -> Result<IngestConfig> {
    let mut config = IngestConfig::from_env()?.with_years(args.start_year, args.end_year);
    if let Some(pacing_ms) = args.pacing_ms {
        config = config.with_pacing_ms(pacing_ms);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::default()
        .with_level(log_level)
        .with_file_prefix("itsdw-ingest")
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));
    let config = match &command {
        Command::Run(args) => load_config(args),
        Command::Reset => load_config(&RunArgs::default()),
    }
    .map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    match command {
        Command::Run(_) => {
            let summary = run_pipeline(&config).await.map_err(|e| {
                error!(error = %e, "Ingest aborted");
                e
            })?;
            info!(
                inserted = summary.total_inserted(),
                degraded = summary.is_degraded(),
                "Ingest complete"
            );
        },
        Command::Reset => {
            reset_only(&config).await.context("Schema reset failed")?;
            info!("Schema reset complete");
        },
    }

    Ok(())
}
