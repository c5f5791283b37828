//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, Credentials, DispatcherSettings, ExchangeSettings, LoggingConfig,
    StrategySettings,
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

fn environment() -> Environment {
    Environment::with_prefix("TRADING")
        .separator("__")
        .try_parsing(true)
}

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(environment())
        .build()?;

    config.try_deserialize()
}

/// Load configuration from a TOML string, without the environment overlay.
pub fn load_config_str(toml: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
