//! Candle feed backed by the exchange collaborator.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use trading_core::error::{DataError, ExchangeError};
use trading_core::traits::ExchangeClient;
use trading_core::types::{Bar, Timeframe};

/// Default per-call timeout for kline requests.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrieves recent bars for a symbol.
#[derive(Clone)]
pub struct MarketDataFeed {
    exchange: Arc<dyn ExchangeClient>,
    timeout: Duration,
}

impl MarketDataFeed {
    /// Create a new feed on top of an exchange client.
    pub fn new(exchange: Arc<dyn ExchangeClient>) -> Self {
        Self {
            exchange,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch the `count` most recent bars, oldest first.
    ///
    /// Fails with `DataError::Unavailable` when the exchange errors, does not
    /// answer within the timeout, or returns fewer than `count` bars.
    pub async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, DataError> {
        let result = tokio::time::timeout(
            self.timeout,
            self.exchange.get_klines(symbol, interval, count),
        )
        .await
        .unwrap_or(Err(ExchangeError::Timeout(self.timeout)));

        let mut bars = result.map_err(|e| {
            warn!(symbol, interval = %interval, error = %e, "Kline request failed");
            DataError::unavailable(symbol, e)
        })?;

        if bars.len() < count {
            warn!(
                symbol,
                requested = count,
                received = bars.len(),
                "Exchange returned too few bars"
            );
            return Err(DataError::unavailable(
                symbol,
                format!("received {} of {} bars", bars.len(), count),
            ));
        }

        bars.sort_by_key(|b| b.timestamp);
        if bars.len() > count {
            bars.drain(..bars.len() - count);
        }

        debug!(symbol, count, "Fetched bars from {}", self.exchange.name());
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use trading_broker::PaperExchange;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::from_close(i as i64 * 60_000, Decimal::from(100 + i as i64)))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_returns_most_recent_bars() {
        let exchange = Arc::new(PaperExchange::new().with_bars("BTCUSDT", bars(10)));
        let feed = MarketDataFeed::new(exchange);

        let fetched = feed.fetch_bars("BTCUSDT", Timeframe::Minute1, 4).await.unwrap();
        assert_eq!(fetched.len(), 4);
        assert_eq!(fetched[0].close, dec!(106));
        assert_eq!(fetched[3].close, dec!(109));
    }

    #[tokio::test]
    async fn test_short_series_is_unavailable() {
        let exchange = Arc::new(PaperExchange::new().with_bars("BTCUSDT", bars(3)));
        let feed = MarketDataFeed::new(exchange);

        let err = feed.fetch_bars("BTCUSDT", Timeframe::Hour1, 50).await.unwrap_err();
        assert_eq!(err, DataError::unavailable("BTCUSDT", "received 3 of 50 bars"));
    }

    #[tokio::test]
    async fn test_exchange_failure_is_unavailable() {
        let exchange = Arc::new(PaperExchange::new().with_bars("BTCUSDT", bars(60)));
        exchange.fail_klines(true);
        let feed = MarketDataFeed::new(exchange.clone());

        let result = feed.fetch_bars("BTCUSDT", Timeframe::Hour1, 50).await;
        assert!(matches!(result, Err(DataError::Unavailable { .. })));
        assert_eq!(exchange.kline_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_unavailable() {
        let feed = MarketDataFeed::new(Arc::new(PaperExchange::new()));
        assert!(feed.fetch_bars("ETHUSDT", Timeframe::Hour1, 1).await.is_err());
    }
}
