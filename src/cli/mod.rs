//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trading-bot")]
#[command(author, version, about = "Moving-average crossover trading bot")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = trading_config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Trade on Binance with real orders
    Live(LiveArgs),
    /// Trade live market data against a simulated account
    Paper(PaperArgs),
    /// Validate configuration and print the effective settings
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct LiveArgs {
    /// Symbols to trade (comma-separated), defaults to all configured markets
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,
}

#[derive(clap::Args)]
pub struct PaperArgs {
    /// Symbols to trade (comma-separated), defaults to all configured markets
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Starting balance of each market's quote asset
    #[arg(long, default_value = "10000")]
    pub capital: Decimal,

    /// Fill price slippage in percent, against the order side
    #[arg(long, default_value = "0")]
    pub slippage: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_paper_command() {
        let cli = Cli::try_parse_from([
            "trading-bot",
            "--log-level",
            "debug",
            "paper",
            "--capital",
            "2500.5",
            "--slippage",
            "0.05",
            "-S",
            "BTCUSDT,ETHUSDT",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
        assert_eq!(cli.log_level.map(|l| l.as_str()), Some("debug"));
        match cli.command {
            Commands::Paper(args) => {
                assert_eq!(args.capital, dec!(2500.5));
                assert_eq!(args.slippage, dec!(0.05));
                assert_eq!(args.symbols, vec!["BTCUSDT", "ETHUSDT"]);
            }
            _ => panic!("expected paper command"),
        }
    }

    #[test]
    fn test_parse_live_defaults() {
        let cli = Cli::try_parse_from(["trading-bot", "live"]).unwrap();
        assert!(cli.log_level.is_none());
        assert!(!cli.json_logs);
        assert!(matches!(cli.command, Commands::Live(ref args) if args.symbols.is_empty()));
    }

    #[test]
    fn test_paper_defaults_to_no_slippage() {
        let cli = Cli::try_parse_from(["trading-bot", "paper"]).unwrap();
        match cli.command {
            Commands::Paper(args) => {
                assert_eq!(args.capital, dec!(10000));
                assert!(args.slippage.is_zero());
            }
            _ => panic!("expected paper command"),
        }
    }
}
