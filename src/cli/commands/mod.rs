//! CLI command implementations.

pub mod live;
pub mod paper;
pub mod validate;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use trading_broker::OrderDispatcher;
use trading_config::AppConfig;
use trading_core::traits::ExchangeClient;
use trading_core::types::{AccountSnapshot, Market};
use trading_engine::{run_markets, LoopConfig, ShutdownHandle, TradingLoop};

/// Read the account once before trading. Failure here is fatal.
pub async fn startup_account(
    exchange: &dyn ExchangeClient,
    config: &AppConfig,
    markets: &[Market],
) -> Result<AccountSnapshot> {
    let account = tokio::time::timeout(config.dispatcher.call_timeout(), exchange.get_account())
        .await
        .context("Timed out reading the account")?
        .with_context(|| format!("Failed to read the account from {}", exchange.name()))?;

    for market in markets {
        info!(
            symbol = %market.symbol,
            base = %market.base_asset,
            base_free = %account.free(&market.base_asset),
            quote = %market.quote_asset,
            quote_free = %account.free(&market.quote_asset),
            "Starting balances"
        );
    }
    Ok(account)
}

/// Run one trading loop per market until Ctrl-C.
pub async fn run_bot(
    exchange: Arc<dyn ExchangeClient>,
    markets: Vec<Market>,
    config: &AppConfig,
    account: AccountSnapshot,
) -> Result<()> {
    let dispatcher = Arc::new(
        OrderDispatcher::new(exchange.clone(), config.dispatcher.to_dispatcher_config())
            .with_markets(&markets),
    );

    let loop_config = LoopConfig {
        interval: config.strategy.interval,
        crossover: config.strategy.crossover()?,
        risk_fraction: config.strategy.risk_fraction,
        poll_interval: config.strategy.poll_interval(),
        align_to_candle: config.strategy.align_to_candle,
        refresh_balance_each_cycle: config.strategy.refresh_balance_each_cycle,
        call_timeout: config.dispatcher.call_timeout(),
    };

    let loops = markets
        .into_iter()
        .map(|market| {
            TradingLoop::new(market, exchange.clone(), dispatcher.clone(), loop_config.clone())
                .map(|l| l.with_account(account.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let handle = ShutdownHandle::new();
    let shutdown = handle.subscribe();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, shutting down");
                handle.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    for (symbol, summary) in run_markets(loops, shutdown).await {
        info!(
            symbol = %symbol,
            cycles = summary.cycles,
            signals = summary.signals,
            orders = summary.orders,
            failures = summary.failures,
            "Market summary"
        );
    }
    Ok(())
}
