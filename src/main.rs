//! nodelayer - npm dependency layers for container builds
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use nodelayer::cli::{Cli, Commands};
use nodelayer::config::{Config, ConfigManager};
use nodelayer::error::NodeLayerResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> NodeLayerResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Build(args) => nodelayer::cli::commands::build(args, &config).await,
        Commands::Check(args) => nodelayer::cli::commands::check(args, &config).await,
        Commands::Links(args) => nodelayer::cli::commands::links(args, &config).await,
        Commands::SetupSymlinks(args) => nodelayer::cli::commands::setup_symlinks(args).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; the config can force verbose output
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        0 if config.general.verbose => 1,
        v => v,
    };
    let filter = match level {
        0 => EnvFilter::new("nodelayer=warn"),
        1 => EnvFilter::new("nodelayer=info"),
        _ => EnvFilter::new("nodelayer=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
