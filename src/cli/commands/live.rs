//! Live trading command implementation.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use trading_broker::BinanceClient;
use trading_config::AppConfig;
use trading_core::traits::ExchangeClient;

use super::{run_bot, startup_account};
use crate::cli::LiveArgs;

pub async fn run(args: LiveArgs, config: AppConfig) -> Result<()> {
    let markets = config.select_markets(&args.symbols)?;
    let credentials = config
        .exchange
        .credentials()
        .context("Binance API credentials are required for live trading")?;

    let client = BinanceClient::new(config.exchange.signed_client(&credentials))
        .context("Failed to create Binance client")?;
    let exchange: Arc<dyn ExchangeClient> = Arc::new(client);

    info!(
        "Live trading {} market(s) on {}",
        markets.len(),
        config.exchange.base_url
    );
    let account = startup_account(exchange.as_ref(), &config, &markets).await?;

    run_bot(exchange, markets, &config, account).await
}
