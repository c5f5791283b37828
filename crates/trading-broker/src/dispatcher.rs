//! Guarded order submission.
//!
//! The dispatcher sits between the trading loop and the exchange. It keeps at
//! most one outstanding order per symbol, paces submissions with a shared
//! rate limiter, bounds every exchange call with a timeout and retries
//! transient failures with the same client order id.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use trading_core::error::{DispatchError, ExchangeError};
use trading_core::traits::ExchangeClient;
use trading_core::types::{Market, MarketOrderRequest, Order, OrderReceipt, OrderStatus, Side};

type OrderRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Retry, timeout and pacing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on every single exchange call
    pub call_timeout: Duration,
    /// Submissions per minute across all symbols
    pub orders_per_minute: u32,
    /// Age after which a pending order the exchange cannot report is given up
    pub pending_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            call_timeout: Duration::from_secs(10),
            orders_per_minute: 60,
            pending_timeout: Duration::from_secs(900),
        }
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    order: Order,
    since: Instant,
}

/// Submits market orders on behalf of every trading loop.
pub struct OrderDispatcher {
    exchange: Arc<dyn ExchangeClient>,
    config: DispatcherConfig,
    min_lot_sizes: HashMap<String, Decimal>,
    limiter: OrderRateLimiter,
    in_flight: Mutex<HashMap<String, InFlight>>,
    history: Mutex<HashMap<String, Order>>,
}

impl OrderDispatcher {
    pub fn new(exchange: Arc<dyn ExchangeClient>, config: DispatcherConfig) -> Self {
        let per_minute = NonZeroU32::new(config.orders_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            exchange,
            config,
            min_lot_sizes: HashMap::new(),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            in_flight: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Enforce the minimum lot sizes of these markets.
    pub fn with_markets<'a>(mut self, markets: impl IntoIterator<Item = &'a Market>) -> Self {
        for market in markets {
            self.min_lot_sizes
                .insert(market.symbol.clone(), market.min_lot_size);
        }
        self
    }

    pub fn min_lot_size(&self, symbol: &str) -> Decimal {
        self.min_lot_sizes
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// The pending order for a symbol, if any.
    pub fn in_flight(&self, symbol: &str) -> Option<Order> {
        lock(&self.in_flight).get(symbol).map(|entry| entry.order.clone())
    }

    /// The latest order for a symbol, pending or finished.
    pub fn last_order(&self, symbol: &str) -> Option<Order> {
        self.in_flight(symbol)
            .or_else(|| lock(&self.history).get(symbol).cloned())
    }

    /// Submit a market order.
    ///
    /// Returns the order in the state the exchange reported. A `Pending`
    /// order keeps the symbol blocked until [`reconcile`](Self::reconcile)
    /// sees it finish.
    pub async fn submit(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<Order, DispatchError> {
        self.submit_until(symbol, side, quantity, std::future::pending())
            .await
    }

    /// Like [`submit`](Self::submit), but no retry starts once `cancel`
    /// completes. A call already sent to the exchange is never abandoned.
    pub async fn submit_until(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        cancel: impl Future<Output = ()>,
    ) -> Result<Order, DispatchError> {
        let min_lot_size = self.min_lot_size(symbol);
        if quantity <= min_lot_size || quantity <= Decimal::ZERO {
            return Err(DispatchError::BelowMinimumLot {
                symbol: symbol.to_string(),
                quantity,
                min_lot_size,
            });
        }

        let request = MarketOrderRequest::new(symbol, side, quantity);
        let mut order = self.reserve(&request)?;
        tokio::pin!(cancel);

        let mut attempts = 0;
        let mut backoff = self.config.initial_backoff;
        loop {
            attempts += 1;

            let e = match self.attempt(&request, attempts).await {
                Ok(receipt) => return self.accept(order, &receipt),
                Err(e) => e,
            };

            if !e.is_retryable() && attempts == 1 {
                let reason = e.to_string();
                order.transition(OrderStatus::Rejected, Some(reason.clone()));
                self.finish(order);
                return Err(DispatchError::Rejected {
                    symbol: symbol.to_string(),
                    reason,
                });
            }
            // Earlier attempts may have reached the exchange
            if !e.is_retryable() || attempts > self.config.max_retries {
                return self.give_up(order, &request, attempts, e).await;
            }

            warn!(
                symbol,
                client_order_id = %request.client_order_id,
                attempt = attempts,
                error = %e,
                "Order submission failed, retrying in {:?}",
                backoff
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = &mut cancel => {
                    info!(
                        symbol,
                        client_order_id = %request.client_order_id,
                        "Shutdown requested, not retrying order"
                    );
                    return self.give_up(order, &request, attempts, e).await;
                }
            }
            backoff = (backoff * 2).min(self.config.max_backoff);
        }
    }

    /// Refresh the pending order for a symbol from the exchange.
    ///
    /// Returns the order after the update, or `None` when nothing is pending.
    /// An order the exchange does not know is failed. A failed query leaves
    /// the order pending until it is older than the pending timeout.
    pub async fn reconcile(&self, symbol: &str) -> Option<Order> {
        let InFlight { mut order, since } = lock(&self.in_flight).get(symbol).cloned()?;

        let receipt = match self
            .call(self.exchange.get_order(symbol, &order.client_order_id))
            .await
        {
            Ok(receipt) => receipt,
            Err(ExchangeError::OrderNotFound(_)) => {
                warn!(
                    symbol,
                    client_order_id = %order.client_order_id,
                    "Pending order never reached the exchange"
                );
                order.transition(
                    OrderStatus::Failed,
                    Some("order not found on exchange".into()),
                );
                self.finish(order.clone());
                return Some(order);
            }
            Err(e) if since.elapsed() >= self.config.pending_timeout => {
                error!(
                    symbol,
                    client_order_id = %order.client_order_id,
                    error = %e,
                    "Pending order unresolved after {:?}, giving up",
                    self.config.pending_timeout
                );
                order.transition(
                    OrderStatus::Failed,
                    Some(format!(
                        "unresolved after {:?}: {}",
                        self.config.pending_timeout, e
                    )),
                );
                self.finish(order.clone());
                return Some(order);
            }
            Err(e) => {
                warn!(
                    symbol,
                    client_order_id = %order.client_order_id,
                    error = %e,
                    "Could not query pending order"
                );
                return Some(order);
            }
        };

        order.apply_receipt(&receipt);
        if order.status.is_terminal() {
            info!(
                symbol,
                client_order_id = %order.client_order_id,
                status = %order.status,
                "Pending order settled"
            );
            self.finish(order.clone());
        } else {
            self.keep_pending(order.clone());
        }
        Some(order)
    }

    /// Claim the symbol's slot. The lock is released before any await.
    fn reserve(&self, request: &MarketOrderRequest) -> Result<Order, DispatchError> {
        let mut in_flight = lock(&self.in_flight);
        if let Some(existing) = in_flight.get(&request.symbol) {
            debug!(
                symbol = %request.symbol,
                client_order_id = %existing.order.client_order_id,
                "Order deferred, previous order still pending"
            );
            return Err(DispatchError::OrderInFlight {
                symbol: request.symbol.clone(),
                client_order_id: existing.order.client_order_id.clone(),
            });
        }

        let order = Order::from_request(request);
        in_flight.insert(
            request.symbol.clone(),
            InFlight {
                order: order.clone(),
                since: Instant::now(),
            },
        );
        Ok(order)
    }

    /// One paced, timeout-bounded submission.
    ///
    /// After a failed attempt the order may have reached the exchange anyway,
    /// so later attempts look it up by client order id first and only resend
    /// when the exchange confirms it does not have it.
    async fn attempt(
        &self,
        request: &MarketOrderRequest,
        attempt: u32,
    ) -> Result<OrderReceipt, ExchangeError> {
        if attempt > 1 {
            match self.lookup(request).await {
                Ok(receipt) => return Ok(receipt),
                Err(ExchangeError::OrderNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.limiter.until_ready().await;
        self.call(self.exchange.create_market_order(request)).await
    }

    async fn lookup(&self, request: &MarketOrderRequest) -> Result<OrderReceipt, ExchangeError> {
        let receipt = self
            .call(
                self.exchange
                    .get_order(&request.symbol, &request.client_order_id),
            )
            .await?;
        debug!(
            symbol = %request.symbol,
            client_order_id = %request.client_order_id,
            "Order found on exchange after failed attempt"
        );
        Ok(receipt)
    }

    /// Settle an order whose last attempt failed.
    ///
    /// Only an exchange that confirms the order does not exist frees the
    /// slot. When that cannot be confirmed the order stays pending.
    async fn give_up(
        &self,
        mut order: Order,
        request: &MarketOrderRequest,
        attempts: u32,
        last_error: ExchangeError,
    ) -> Result<Order, DispatchError> {
        let symbol = request.symbol.clone();
        match self.lookup(request).await {
            Ok(receipt) => self.accept(order, &receipt),
            Err(ExchangeError::OrderNotFound(_)) => {
                let reason = last_error.to_string();
                if last_error.is_retryable() {
                    order.transition(OrderStatus::Failed, Some(reason.clone()));
                    self.finish(order);
                    Err(DispatchError::DispatchFailed {
                        symbol,
                        attempts,
                        reason,
                    })
                } else {
                    order.transition(OrderStatus::Rejected, Some(reason.clone()));
                    self.finish(order);
                    Err(DispatchError::Rejected { symbol, reason })
                }
            }
            Err(e) => {
                let reason = format!("{}; order lookup failed: {}", last_error, e);
                warn!(
                    symbol = %symbol,
                    client_order_id = %order.client_order_id,
                    error = %reason,
                    "Order fate unknown, keeping it pending"
                );
                order.reason = Some(reason.clone());
                let client_order_id = order.client_order_id.clone();
                self.keep_pending(order);
                Err(DispatchError::Unconfirmed {
                    symbol,
                    client_order_id,
                    reason,
                })
            }
        }
    }

    fn accept(&self, mut order: Order, receipt: &OrderReceipt) -> Result<Order, DispatchError> {
        order.apply_receipt(receipt);

        match order.status {
            OrderStatus::Pending => {
                info!(
                    symbol = %order.symbol,
                    client_order_id = %order.client_order_id,
                    "Order accepted, awaiting fill"
                );
                self.keep_pending(order.clone());
                Ok(order)
            }
            OrderStatus::Filled => {
                info!(
                    symbol = %order.symbol,
                    side = %order.side,
                    quantity = %order.executed_quantity,
                    client_order_id = %order.client_order_id,
                    "Order filled"
                );
                self.finish(order.clone());
                Ok(order)
            }
            OrderStatus::Rejected | OrderStatus::Failed => {
                let symbol = order.symbol.clone();
                let reason = format!("exchange reported order {}", order.status);
                order.reason = Some(reason.clone());
                self.finish(order);
                Err(DispatchError::Rejected { symbol, reason })
            }
        }
    }

    /// Update the reserved slot, keeping its age.
    fn keep_pending(&self, order: Order) {
        let since = Instant::now();
        let symbol = order.symbol.clone();
        let initial = order.clone();
        lock(&self.in_flight)
            .entry(symbol)
            .or_insert(InFlight {
                order: initial,
                since,
            })
            .order = order;
    }

    fn finish(&self, order: Order) {
        lock(&self.in_flight).remove(&order.symbol);
        lock(&self.history).insert(order.symbol.clone(), order);
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, ExchangeError>>,
    ) -> Result<T, ExchangeError> {
        tokio::time::timeout(self.config.call_timeout, fut)
            .await
            .unwrap_or(Err(ExchangeError::Timeout(self.config.call_timeout)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
