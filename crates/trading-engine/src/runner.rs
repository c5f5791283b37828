//! One task per market.

use futures::future::join_all;
use tracing::{error, info};

use crate::shutdown::Shutdown;
use crate::trading_loop::{LoopSummary, TradingLoop};

/// Run every loop on its own task until `shutdown` triggers.
///
/// Loops built on the same dispatcher share its per-symbol guard and rate
/// limiter. Returns each market's summary; a task that panicked is logged
/// and left out.
pub async fn run_markets(loops: Vec<TradingLoop>, shutdown: Shutdown) -> Vec<(String, LoopSummary)> {
    info!("Starting {} market task(s)", loops.len());

    let handles: Vec<_> = loops
        .into_iter()
        .map(|mut trading_loop| {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let symbol = trading_loop.market().symbol.clone();
                let summary = trading_loop.run(shutdown).await;
                (symbol, summary)
            })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!("Market task failed: {}", e);
                None
            }
        })
        .collect()
}
