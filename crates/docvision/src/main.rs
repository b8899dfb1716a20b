//! DocVision CLI - structured JSON extraction from document images.
//!
//! Sends each image, together with an instruction, to a remote vision model
//! and prints the recovered JSON documents as one array on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Extract from two scans with one instruction
//! docvision extract invoice-1.jpg invoice-2.jpg -i "retrieve the line items"
//!
//! # Offline contract check, no network
//! docvision extract --static
//!
//! # View configuration
//! docvision config show
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// DocVision - structured JSON extraction from document images.
#[derive(Parser, Debug)]
#[command(name = "docvision")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to a config file (defaults to the platform config location)
    #[arg(short, long, global = true, env = "DOCVISION_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract structured data from document images
    Extract(cli::extract::ExtractArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `config init` creates the file, so it may not exist yet
    let creating = matches!(
        &cli.command,
        Commands::Config(cli::config::ConfigArgs {
            command: cli::config::ConfigCommand::Init { .. }
        })
    );
    let config = load_config(cli.config.as_deref(), creating)?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("DocVision v{}", docvision_core::VERSION);

    match cli.command {
        Commands::Extract(args) => cli::extract::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, &config, cli.config).await,
    }
}

/// Load the config named by `--config`, or the platform default.
///
/// Logging isn't initialized yet, so warnings go through eprintln.
fn load_config(
    path: Option<&Path>,
    may_be_missing: bool,
) -> anyhow::Result<docvision_core::Config> {
    match path {
        Some(path) if may_be_missing && !path.exists() => Ok(docvision_core::Config::default()),
        Some(path) => docvision_core::Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(docvision_core::Config::load().unwrap_or_else(|e| {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `docvision config path`."
            );
            docvision_core::Config::default()
        })),
    }
}
