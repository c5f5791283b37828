//! Per-market trading loop.
//!
//! Each cycle walks `Idle -> Evaluating -> Dispatching -> Sleeping` and
//! starts over. Nothing inside a cycle is fatal: data gaps, sizing problems
//! and dispatch errors are logged and the loop waits for the next cycle.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use trading_broker::OrderDispatcher;
use trading_core::error::{DataError, DispatchError, ExchangeError, IndicatorError, TradingError};
use trading_core::traits::ExchangeClient;
use trading_core::types::{AccountSnapshot, Crossover, Market, Order, Side, Timeframe};
use trading_data::MarketDataFeed;
use trading_risk::RiskSizer;
use trading_strategies::{MACrossoverConfig, MACrossoverStrategy};

use crate::shutdown::Shutdown;

/// Where the loop currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Evaluating,
    Dispatching,
    Sleeping,
}

/// Loop settings.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub interval: Timeframe,
    pub crossover: MACrossoverConfig,
    pub risk_fraction: Decimal,
    pub poll_interval: Duration,
    /// Sleep until the next candle opens instead of `poll_interval`
    pub align_to_candle: bool,
    /// Re-read the account before sizing each order
    pub refresh_balance_each_cycle: bool,
    /// Bound on data and account requests
    pub call_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Timeframe::Hour1,
            crossover: MACrossoverConfig::default(),
            risk_fraction: Decimal::new(1, 2),
            poll_interval: Duration::from_secs(60),
            align_to_candle: false,
            refresh_balance_each_cycle: true,
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// What a single cycle ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Bars could not be fetched; nothing was evaluated
    DataUnavailable(DataError),
    /// Not enough bars for the moving averages
    InsufficientData(IndicatorError),
    /// Averages equal, nothing to do
    Hold(Crossover),
    /// Actionable signal that did not lead to an order
    Skipped { crossover: Crossover, reason: String },
    /// Order accepted by the exchange
    Dispatched { crossover: Crossover, order: Order },
    /// Order deferred, rejected or failed
    DispatchFailed {
        crossover: Crossover,
        error: DispatchError,
    },
}

impl CycleOutcome {
    pub fn crossover(&self) -> Option<&Crossover> {
        match self {
            CycleOutcome::DataUnavailable(_) | CycleOutcome::InsufficientData(_) => None,
            CycleOutcome::Hold(crossover)
            | CycleOutcome::Skipped { crossover, .. }
            | CycleOutcome::Dispatched { crossover, .. }
            | CycleOutcome::DispatchFailed { crossover, .. } => Some(crossover),
        }
    }
}

/// Counters kept over the lifetime of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSummary {
    pub cycles: u64,
    /// Buy or sell signals seen
    pub signals: u64,
    /// Orders accepted by the exchange
    pub orders: u64,
    /// Cycles that hit a data or dispatch error
    pub failures: u64,
}

/// Trading loop for a single market.
pub struct TradingLoop {
    market: Market,
    exchange: Arc<dyn ExchangeClient>,
    dispatcher: Arc<OrderDispatcher>,
    feed: MarketDataFeed,
    strategy: MACrossoverStrategy,
    sizer: RiskSizer,
    config: LoopConfig,
    account: AccountSnapshot,
    state: LoopState,
    summary: LoopSummary,
}

impl TradingLoop {
    /// Create a loop for `market`.
    ///
    /// Fails when the crossover windows or the risk fraction are invalid.
    pub fn new(
        market: Market,
        exchange: Arc<dyn ExchangeClient>,
        dispatcher: Arc<OrderDispatcher>,
        config: LoopConfig,
    ) -> Result<Self, TradingError> {
        let strategy = MACrossoverStrategy::new(config.crossover)?;
        let sizer = RiskSizer::new(config.risk_fraction)?;
        let feed = MarketDataFeed::new(exchange.clone()).with_timeout(config.call_timeout);

        Ok(Self {
            market,
            exchange,
            dispatcher,
            feed,
            strategy,
            sizer,
            config,
            account: AccountSnapshot::default(),
            state: LoopState::Idle,
            summary: LoopSummary::default(),
        })
    }

    /// Balances to size orders with until the next refresh.
    pub fn with_account(mut self, account: AccountSnapshot) -> Self {
        self.account = account;
        self
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn summary(&self) -> LoopSummary {
        self.summary
    }

    /// Run cycles until `shutdown` triggers.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> LoopSummary {
        info!(
            symbol = %self.market.symbol,
            interval = %self.config.interval,
            short_window = self.config.crossover.short_window,
            long_window = self.config.crossover.long_window,
            "Trading loop started"
        );

        loop {
            self.state = LoopState::Idle;
            if shutdown.is_triggered() {
                break;
            }

            self.run_cycle(&mut shutdown).await;

            self.state = LoopState::Sleeping;
            let delay = self.sleep_duration(chrono::Utc::now().timestamp_millis());
            debug!(symbol = %self.market.symbol, "Sleeping for {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.triggered() => break,
            }
        }

        self.state = LoopState::Idle;
        info!(
            symbol = %self.market.symbol,
            cycles = self.summary.cycles,
            signals = self.summary.signals,
            orders = self.summary.orders,
            failures = self.summary.failures,
            "Trading loop stopped"
        );
        self.summary
    }

    /// Run one cycle up to, but not including, the sleep.
    ///
    /// A triggered `shutdown` stops the cycle before it dispatches and stops
    /// the dispatcher from retrying.
    pub async fn run_cycle(&mut self, shutdown: &mut Shutdown) -> CycleOutcome {
        let outcome = self.cycle(shutdown).await;
        self.record(&outcome);
        outcome
    }

    async fn cycle(&mut self, shutdown: &mut Shutdown) -> CycleOutcome {
        let symbol = self.market.symbol.clone();

        self.state = LoopState::Idle;
        if self.dispatcher.in_flight(&symbol).is_some() {
            self.dispatcher.reconcile(&symbol).await;
        }

        self.state = LoopState::Evaluating;
        let bars = match self
            .feed
            .fetch_bars(&symbol, self.config.interval, self.strategy.bars_required())
            .await
        {
            Ok(bars) => bars,
            Err(e) => return CycleOutcome::DataUnavailable(e),
        };

        let crossover = match self.strategy.evaluate(&bars) {
            Ok(crossover) => crossover,
            Err(e) => return CycleOutcome::InsufficientData(e),
        };
        let side = match crossover.signal.side() {
            Some(side) => side,
            None => return CycleOutcome::Hold(crossover),
        };

        if shutdown.is_triggered() {
            return CycleOutcome::Skipped {
                crossover,
                reason: "shutting down".to_string(),
            };
        }

        self.state = LoopState::Dispatching;
        if self.config.refresh_balance_each_cycle {
            if let Err(e) = self.refresh_account().await {
                return CycleOutcome::Skipped {
                    crossover,
                    reason: format!("account refresh failed: {}", e),
                };
            }
        }

        let last_close = bars.last().map(|b| b.close).unwrap_or_default();
        let quantity = match self
            .sizer
            .order_quantity(side, &self.account, &self.market, last_close)
        {
            Ok(quantity) => quantity,
            Err(e) => {
                return CycleOutcome::Skipped {
                    crossover,
                    reason: e.to_string(),
                }
            }
        };
        if quantity.is_zero() {
            return CycleOutcome::Skipped {
                crossover,
                reason: format!("no {} balance to {}", self.funding_asset(side), side),
            };
        }

        match self
            .dispatcher
            .submit_until(&symbol, side, quantity, shutdown.triggered())
            .await
        {
            Ok(order) => CycleOutcome::Dispatched { crossover, order },
            Err(error) => CycleOutcome::DispatchFailed { crossover, error },
        }
    }

    async fn refresh_account(&mut self) -> Result<(), ExchangeError> {
        let account = tokio::time::timeout(self.config.call_timeout, self.exchange.get_account())
            .await
            .unwrap_or(Err(ExchangeError::Timeout(self.config.call_timeout)))?;
        self.account = account;
        Ok(())
    }

    fn funding_asset(&self, side: Side) -> &str {
        match side {
            Side::Buy => &self.market.quote_asset,
            Side::Sell => &self.market.base_asset,
        }
    }

    /// Update counters and write the cycle's log line.
    fn record(&mut self, outcome: &CycleOutcome) {
        self.summary.cycles += 1;
        if outcome
            .crossover()
            .map_or(false, |c| c.signal.is_actionable())
        {
            self.summary.signals += 1;
        }

        let symbol = self.market.symbol.as_str();
        match outcome {
            CycleOutcome::DataUnavailable(e) => {
                self.summary.failures += 1;
                warn!(symbol, error = %e, "Data unavailable, skipping cycle");
            }
            CycleOutcome::InsufficientData(e) => {
                self.summary.failures += 1;
                warn!(symbol, error = %e, "Insufficient data, skipping cycle");
            }
            CycleOutcome::Hold(c) => {
                info!(
                    symbol,
                    signal = %c.signal,
                    short_avg = %c.short_avg,
                    long_avg = %c.long_avg,
                    "No crossover"
                );
            }
            CycleOutcome::Skipped { crossover: c, reason } => {
                info!(
                    symbol,
                    signal = %c.signal,
                    short_avg = %c.short_avg,
                    long_avg = %c.long_avg,
                    reason = %reason,
                    "Signal skipped"
                );
            }
            CycleOutcome::Dispatched { crossover: c, order } => {
                self.summary.orders += 1;
                info!(
                    symbol,
                    signal = %c.signal,
                    short_avg = %c.short_avg,
                    long_avg = %c.long_avg,
                    quantity = %order.quantity,
                    client_order_id = %order.client_order_id,
                    status = %order.status,
                    "Order dispatched"
                );
            }
            CycleOutcome::DispatchFailed { crossover: c, error: e } => {
                self.summary.failures += 1;
                match e {
                    DispatchError::OrderInFlight { .. } => warn!(
                        symbol,
                        signal = %c.signal,
                        error = %e,
                        "Order deferred"
                    ),
                    _ => error!(
                        symbol,
                        signal = %c.signal,
                        short_avg = %c.short_avg,
                        long_avg = %c.long_avg,
                        error = %e,
                        "Order dispatch failed"
                    ),
                }
            }
        }
    }

    fn sleep_duration(&self, now_ms: i64) -> Duration {
        if !self.config.align_to_candle {
            return self.config.poll_interval;
        }
        let next = self.config.interval.next_boundary(now_ms);
        // Small grace so the new candle exists when we ask for it
        Duration::from_millis((next - now_ms).max(0) as u64) + Duration::from_secs(1)
    }
}
