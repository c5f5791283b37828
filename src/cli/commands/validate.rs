//! Validate configuration command.

use anyhow::{Context, Result};
use std::path::Path;
use trading_config::load_config;

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = load_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render configuration")?
    );
    Ok(())
}
