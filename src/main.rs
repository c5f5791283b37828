//! Moving-average crossover trading bot.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use trading_config::{load_config, AppConfig};
use trading_monitor::{setup_logging, LogGuard};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let Cli {
        config,
        log_level,
        json_logs,
        command,
    } = Cli::parse();

    match command {
        Commands::ValidateConfig => cli::commands::validate::run(&config),
        Commands::Live(args) => {
            let (settings, _guard) = init(&config, log_level, json_logs)?;
            cli::commands::live::run(args, settings).await
        }
        Commands::Paper(args) => {
            let (settings, _guard) = init(&config, log_level, json_logs)?;
            cli::commands::paper::run(args, settings).await
        }
    }
}

/// Load and check the configuration, then start logging.
fn init(
    path: &Path,
    log_level: Option<cli::LogLevel>,
    json_logs: bool,
) -> Result<(AppConfig, LogGuard)> {
    let config = load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate().context("Invalid configuration")?;

    let level = log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let json = json_logs || config.logging.format == "json";
    let guard = setup_logging(&level, json, config.logging.file.as_deref().map(Path::new))
        .context("Failed to set up logging")?;

    Ok((config, guard))
}
