//! qatrain CLI - Main Entry Point
//!
//! Operator commands for the QA training test harness: reset the fixture
//! database, inspect the reset policy and connection string, and bring the
//! application server up outside a test run.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, reset, resolve, up};
use qatrain_common::HarnessConfig;

/// qatrain - QA Training Test Harness
#[derive(Parser)]
#[command(name = "qatrain")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file; `.json` files are read as JSON, anything else as TOML
    #[arg(long, env = "QATRAIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the database to the fixture script if the policy allows it
    Reset(reset::ResetArgs),

    /// Show the reset decision without touching the database
    Check(reset::ResetArgs),

    /// Resolve a connection string
    Resolve(resolve::ResolveArgs),

    /// Ensure the server is running; hold a launched server until Ctrl-C
    Up,

    /// Show the effective configuration
    Config,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(qatrain_common::default_config_path);
    let config = HarnessConfig::load_with_env(Some(&config_path))?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match cli.command {
        Commands::Reset(args) => reset::execute(args, &config, cli.format).await?,
        Commands::Check(args) => reset::check(args, &config, cli.format)?,
        Commands::Resolve(args) => resolve::execute(args, &config, cli.format)?,
        Commands::Up => up::execute(&config, cli.format).await?,
        Commands::Config => config::execute(&config, cli.format)?,
        Commands::Version => {
            println!("qatrain v{}", qatrain_common::VERSION);
        }
    }

    Ok(())
}
