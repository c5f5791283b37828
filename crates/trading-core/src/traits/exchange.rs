//! Exchange collaborator contract.

use crate::error::ExchangeError;
use crate::types::{AccountSnapshot, Bar, MarketOrderRequest, OrderReceipt, Timeframe};
use async_trait::async_trait;

/// Trait for exchange integrations.
///
/// The exchange supplies candles, balances and market order execution.
/// Implementations handle transport, authentication and request signing;
/// callers are responsible for timeouts and retries.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetch the most recent candles.
    ///
    /// # Arguments
    /// * `symbol` - The market symbol, e.g. `BTCUSDT`
    /// * `interval` - Candle interval
    /// * `limit` - Maximum number of candles to return
    ///
    /// # Returns
    /// Bars ordered from oldest to newest
    async fn get_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExchangeError>;

    /// Get the account balances.
    async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError>;

    /// Submit a market order.
    ///
    /// Submitting the same `client_order_id` twice must not create a second
    /// order on the exchange.
    async fn create_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderReceipt, ExchangeError>;

    /// Look up an order by the client order id it was submitted with.
    ///
    /// Fails with `ExchangeError::OrderNotFound` when the exchange has no
    /// order under that id.
    async fn get_order(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<OrderReceipt, ExchangeError>;

    /// Get the exchange name.
    fn name(&self) -> &str;
}
