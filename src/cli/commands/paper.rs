//! Paper trading command implementation.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use trading_broker::{BinanceClient, PaperExchange};
use trading_config::AppConfig;
use trading_core::traits::ExchangeClient;

use super::{run_bot, startup_account};
use crate::cli::PaperArgs;

pub async fn run(args: PaperArgs, config: AppConfig) -> Result<()> {
    if args.slippage.is_sign_negative() || args.slippage >= Decimal::ONE_HUNDRED {
        bail!("Slippage must be between 0 and 100 percent, got {}", args.slippage);
    }
    let markets = config.select_markets(&args.symbols)?;

    let upstream = BinanceClient::new(config.exchange.public_client())
        .context("Failed to create Binance market data client")?;

    let mut paper = PaperExchange::new()
        .with_upstream(Arc::new(upstream))
        .with_slippage(args.slippage);
    let quote_assets: BTreeSet<&str> = markets.iter().map(|m| m.quote_asset.as_str()).collect();
    for asset in quote_assets {
        paper = paper.with_balance(asset, args.capital);
    }
    for market in &markets {
        paper = paper.with_market(market.clone());
    }
    let exchange: Arc<dyn ExchangeClient> = Arc::new(paper);

    info!(
        "Paper trading {} market(s) with {} of each quote asset, {}% slippage",
        markets.len(),
        args.capital,
        args.slippage
    );
    let account = startup_account(exchange.as_ref(), &config, &markets).await?;

    run_bot(exchange, markets, &config, account).await
}
