//! ppulse - prompt-pulse command line
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use prompt_pulse::cli::{Cli, Commands};
use prompt_pulse::config::{Config, ConfigManager};
use prompt_pulse::error::PulseResult;
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

async fn run() -> PulseResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions { shell } = cli.command {
        prompt_pulse::cli::commands::completions(shell);
        return Ok(());
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Loaded config from {}", config_manager.path().display());

    match cli.command {
        Commands::Completions { .. } => unreachable!("Completions handled above"),
        Commands::Cache(args) => prompt_pulse::cli::commands::cache(args, &config).await,
        Commands::Image(args) => prompt_pulse::cli::commands::image(args, &config).await,
        Commands::Session(args) => prompt_pulse::cli::commands::session(args, &config).await,
        Commands::Prefetch(args) => prompt_pulse::cli::commands::prefetch(args, &config).await,
        Commands::Config(args) => {
            prompt_pulse::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; logs go to stderr so stdout stays clean
/// for values and renders
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("prompt_pulse=warn"),
        1 => EnvFilter::new("prompt_pulse=info"),
        _ => EnvFilter::new("prompt_pulse=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
