//! Paper exchange for dry runs and simulation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use trading_core::error::ExchangeError;
use trading_core::traits::ExchangeClient;
use trading_core::types::{
    AccountSnapshot, Balance, Bar, Market, MarketOrderRequest, OrderReceipt, OrderStatus, Side,
    Timeframe,
};
use tracing::{debug, info};

/// When submitted market orders are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Orders fill on submission
    #[default]
    Immediate,
    /// Orders stay pending until [`PaperExchange::settle_pending`]
    Deferred,
}

#[derive(Debug, Default)]
struct PaperState {
    balances: HashMap<String, Balance>,
    markets: HashMap<String, Market>,
    bars: HashMap<String, Vec<Bar>>,
    last_prices: HashMap<String, Decimal>,
    orders: HashMap<String, OrderReceipt>,
    requests: HashMap<String, MarketOrderRequest>,
    next_order_id: u64,
}

/// Simulated exchange.
///
/// Candles come either from scripted bars or from an upstream client (real
/// market data); balances and orders are kept in memory. Failures can be
/// injected for every call.
pub struct PaperExchange {
    state: Mutex<PaperState>,
    upstream: Option<Arc<dyn ExchangeClient>>,
    fill_mode: FillMode,
    slippage_pct: Decimal,
    fail_klines: AtomicBool,
    fail_order_queries: AtomicBool,
    reject_orders: AtomicBool,
    transient_order_failures: AtomicU32,
    order_latency_ms: AtomicU32,
    kline_calls: AtomicUsize,
    account_calls: AtomicUsize,
    order_calls: AtomicUsize,
}

impl PaperExchange {
    /// Create an empty paper exchange.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PaperState::default()),
            upstream: None,
            fill_mode: FillMode::Immediate,
            slippage_pct: Decimal::ZERO,
            fail_klines: AtomicBool::new(false),
            fail_order_queries: AtomicBool::new(false),
            reject_orders: AtomicBool::new(false),
            transient_order_failures: AtomicU32::new(0),
            order_latency_ms: AtomicU32::new(0),
            kline_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            order_calls: AtomicUsize::new(0),
        }
    }

    /// Serve candles from another exchange client.
    pub fn with_upstream(mut self, upstream: Arc<dyn ExchangeClient>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Register a market so orders on it can move balances.
    pub fn with_market(self, market: Market) -> Self {
        self.lock().markets.insert(market.symbol.clone(), market);
        self
    }

    /// Credit a free balance.
    pub fn with_balance(self, asset: impl Into<String>, free: Decimal) -> Self {
        self.lock()
            .balances
            .insert(asset.into(), Balance::new(free, Decimal::ZERO));
        self
    }

    /// Script the candles served for a symbol.
    pub fn with_bars(self, symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        self.set_bars(symbol, bars);
        self
    }

    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Set slippage percentage.
    pub fn with_slippage(mut self, slippage_pct: Decimal) -> Self {
        self.slippage_pct = slippage_pct;
        self
    }

    /// Replace the scripted candles for a symbol.
    pub fn set_bars(&self, symbol: impl Into<String>, bars: Vec<Bar>) {
        let symbol = symbol.into();
        let mut state = self.lock();
        if let Some(last) = bars.last() {
            state.last_prices.insert(symbol.clone(), last.close);
        }
        state.bars.insert(symbol, bars);
    }

    /// Make every kline request fail.
    pub fn fail_klines(&self, fail: bool) {
        self.fail_klines.store(fail, Ordering::SeqCst);
    }

    /// Make every order query fail with a transport error.
    pub fn fail_order_queries(&self, fail: bool) {
        self.fail_order_queries.store(fail, Ordering::SeqCst);
    }

    /// Make every order submission be refused.
    pub fn reject_orders(&self, reject: bool) {
        self.reject_orders.store(reject, Ordering::SeqCst);
    }

    /// Fail the next `count` order submissions with a transport error.
    pub fn fail_next_orders(&self, count: u32) {
        self.transient_order_failures.store(count, Ordering::SeqCst);
    }

    /// Delay every order submission.
    pub fn set_order_latency(&self, latency: Duration) {
        self.order_latency_ms
            .store(latency.as_millis() as u32, Ordering::SeqCst);
    }

    /// Fill every pending order at the current price.
    pub fn settle_pending(&self) -> usize {
        let mut state = self.lock();
        let pending: Vec<String> = state
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .map(|o| o.client_order_id.clone())
            .collect();

        let mut settled = 0;
        for client_order_id in pending {
            let request = state.requests.get(&client_order_id).cloned();
            let (status, executed_quantity) = match request {
                Some(request) => match Self::execute(&mut state, &request, self.slippage_pct) {
                    Ok(()) => {
                        settled += 1;
                        (OrderStatus::Filled, request.quantity)
                    }
                    Err(_) => (OrderStatus::Rejected, Decimal::ZERO),
                },
                None => (OrderStatus::Rejected, Decimal::ZERO),
            };
            if let Some(receipt) = state.orders.get_mut(&client_order_id) {
                receipt.status = status;
                receipt.executed_quantity = executed_quantity;
            }
        }
        settled
    }

    /// Free balance of an asset.
    pub fn balance(&self, asset: &str) -> Decimal {
        self.lock()
            .balances
            .get(asset)
            .map(|b| b.free)
            .unwrap_or_default()
    }

    /// All orders received so far.
    pub fn orders(&self) -> Vec<OrderReceipt> {
        self.lock().orders.values().cloned().collect()
    }

    pub fn kline_calls(&self) -> usize {
        self.kline_calls.load(Ordering::SeqCst)
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move balances for a filled market order.
    fn execute(
        state: &mut PaperState,
        request: &MarketOrderRequest,
        slippage_pct: Decimal,
    ) -> Result<(), ExchangeError> {
        let market = state
            .markets
            .get(&request.symbol)
            .cloned()
            .ok_or_else(|| ExchangeError::Validation(format!("Invalid symbol {}", request.symbol)))?;
        let price = *state.last_prices.get(&request.symbol).ok_or_else(|| {
            ExchangeError::Validation(format!("No price for {}", request.symbol))
        })?;

        // Apply slippage
        let fill_price = match request.side {
            Side::Buy => price * (dec!(1) + slippage_pct / dec!(100)),
            Side::Sell => price * (dec!(1) - slippage_pct / dec!(100)),
        };
        let notional = fill_price * request.quantity;

        let (debit_asset, debit, credit_asset, credit) = match request.side {
            Side::Buy => (&market.quote_asset, notional, &market.base_asset, request.quantity),
            Side::Sell => (&market.base_asset, request.quantity, &market.quote_asset, notional),
        };

        let available = state
            .balances
            .get(debit_asset)
            .map(|b| b.free)
            .unwrap_or_default();
        if debit > available {
            return Err(ExchangeError::Validation(format!(
                "Account has insufficient balance: required {} {}, available {}",
                debit, debit_asset, available
            )));
        }

        state.balances.entry(debit_asset.clone()).or_default().free -= debit;
        state.balances.entry(credit_asset.clone()).or_default().free += credit;

        info!(
            "Paper fill: {} {} {} @ {}",
            request.side, request.quantity, request.symbol, fill_price
        );
        Ok(())
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn get_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExchangeError> {
        self.kline_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_klines.load(Ordering::SeqCst) {
            return Err(ExchangeError::Transport("simulated kline failure".into()));
        }

        if let Some(upstream) = &self.upstream {
            let bars = upstream.get_klines(symbol, interval, limit).await?;
            if let Some(last) = bars.last() {
                self.lock()
                    .last_prices
                    .insert(symbol.to_string(), last.close);
            }
            return Ok(bars);
        }

        let state = self.lock();
        let bars = state
            .bars
            .get(symbol)
            .ok_or_else(|| ExchangeError::Validation(format!("Invalid symbol {}", symbol)))?;
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }

    async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccountSnapshot::new(self.lock().balances.clone()))
    }

    async fn create_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderReceipt, ExchangeError> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.order_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }

        let remaining = self.transient_order_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_order_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ExchangeError::Transport("simulated connection reset".into()));
        }

        if self.reject_orders.load(Ordering::SeqCst) {
            return Err(ExchangeError::Validation("simulated rejection".into()));
        }

        let mut state = self.lock();

        // Same client id, same order
        if let Some(existing) = state.orders.get(&request.client_order_id) {
            debug!("Duplicate client order id {}", request.client_order_id);
            return Ok(existing.clone());
        }

        let (status, executed_quantity) = match self.fill_mode {
            FillMode::Immediate => {
                Self::execute(&mut state, request, self.slippage_pct)?;
                (OrderStatus::Filled, request.quantity)
            }
            FillMode::Deferred => (OrderStatus::Pending, Decimal::ZERO),
        };

        state.next_order_id += 1;
        let receipt = OrderReceipt {
            exchange_order_id: state.next_order_id.to_string(),
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            status,
            executed_quantity,
        };
        state
            .orders
            .insert(request.client_order_id.clone(), receipt.clone());
        state
            .requests
            .insert(request.client_order_id.clone(), request.clone());

        Ok(receipt)
    }

    async fn get_order(
        &self,
        _symbol: &str,
        client_order_id: &str,
    ) -> Result<OrderReceipt, ExchangeError> {
        if self.fail_order_queries.load(Ordering::SeqCst) {
            return Err(ExchangeError::Transport("simulated query failure".into()));
        }
        self.lock()
            .orders
            .get(client_order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(client_order_id.to_string()))
    }

    fn name(&self) -> &str {
        "Paper Exchange"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> PaperExchange {
        PaperExchange::new()
            .with_market(Market::default())
            .with_balance("USDT", dec!(10000))
            .with_bars("BTCUSDT", vec![Bar::from_close(0, dec!(50000))])
    }

    #[tokio::test]
    async fn test_paper_buy_moves_balances() {
        let exchange = exchange();

        let request = MarketOrderRequest::new("BTCUSDT", Side::Buy, dec!(0.1));
        let receipt = exchange.create_market_order(&request).await.unwrap();

        assert_eq!(receipt.status, OrderStatus::Filled);
        assert_eq!(receipt.executed_quantity, dec!(0.1));
        assert_eq!(exchange.balance("USDT"), dec!(5000));
        assert_eq!(exchange.balance("BTC"), dec!(0.1));
    }

    #[tokio::test]
    async fn test_paper_insufficient_balance_is_rejected() {
        let exchange = exchange();

        let request = MarketOrderRequest::new("BTCUSDT", Side::Sell, dec!(1));
        let err = exchange.create_market_order(&request).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_duplicate_client_id_is_idempotent() {
        let exchange = exchange();

        let request = MarketOrderRequest::new("BTCUSDT", Side::Buy, dec!(0.1));
        let first = exchange.create_market_order(&request).await.unwrap();
        let second = exchange.create_market_order(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(exchange.orders().len(), 1);
        assert_eq!(exchange.balance("BTC"), dec!(0.1));
    }

    #[tokio::test]
    async fn test_slippage_moves_fill_price_against_the_order() {
        let exchange = exchange()
            .with_balance("BTC", dec!(1))
            .with_slippage(dec!(1));

        let buy = MarketOrderRequest::new("BTCUSDT", Side::Buy, dec!(0.1));
        exchange.create_market_order(&buy).await.unwrap();
        // 0.1 BTC at 50500
        assert_eq!(exchange.balance("USDT"), dec!(4950));

        let sell = MarketOrderRequest::new("BTCUSDT", Side::Sell, dec!(0.1));
        exchange.create_market_order(&sell).await.unwrap();
        // 0.1 BTC at 49500
        assert_eq!(exchange.balance("USDT"), dec!(9900));
        assert_eq!(exchange.balance("BTC"), dec!(1));
    }

    #[tokio::test]
    async fn test_unknown_order_query() {
        let exchange = exchange();

        let err = exchange.get_order("BTCUSDT", "mac-missing").await.unwrap_err();
        assert_eq!(err, ExchangeError::OrderNotFound("mac-missing".into()));

        exchange.fail_order_queries(true);
        let err = exchange.get_order("BTCUSDT", "mac-missing").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_deferred_fill() {
        let exchange = exchange().with_fill_mode(FillMode::Deferred);

        let request = MarketOrderRequest::new("BTCUSDT", Side::Buy, dec!(0.1));
        let receipt = exchange.create_market_order(&request).await.unwrap();
        assert_eq!(receipt.status, OrderStatus::Pending);
        assert_eq!(exchange.balance("BTC"), Decimal::ZERO);

        assert_eq!(exchange.settle_pending(), 1);
        let settled = exchange
            .get_order("BTCUSDT", &request.client_order_id)
            .await
            .unwrap();
        assert_eq!(settled.status, OrderStatus::Filled);
        assert_eq!(exchange.balance("BTC"), dec!(0.1));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let exchange = exchange();

        exchange.fail_klines(true);
        assert!(exchange.get_klines("BTCUSDT", Timeframe::Hour1, 1).await.is_err());
        assert_eq!(exchange.kline_calls(), 1);

        exchange.fail_next_orders(1);
        let request = MarketOrderRequest::new("BTCUSDT", Side::Buy, dec!(0.1));
        let err = exchange.create_market_order(&request).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(exchange.create_market_order(&request).await.is_ok());
        assert_eq!(exchange.order_calls(), 2);
    }

    #[tokio::test]
    async fn test_klines_from_upstream() {
        let upstream = Arc::new(
            PaperExchange::new().with_bars("BTCUSDT", vec![Bar::from_close(0, dec!(42000))]),
        );
        let exchange = PaperExchange::new()
            .with_upstream(upstream.clone())
            .with_market(Market::default())
            .with_balance("USDT", dec!(42000));

        let bars = exchange.get_klines("BTCUSDT", Timeframe::Hour1, 1).await.unwrap();
        assert_eq!(bars[0].close, dec!(42000));
        assert_eq!(upstream.kline_calls(), 1);

        let request = MarketOrderRequest::new("BTCUSDT", Side::Buy, dec!(1));
        assert!(exchange.create_market_order(&request).await.is_ok());
        assert_eq!(exchange.balance("USDT"), Decimal::ZERO);
    }
}
