//! Order types and structures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created or accepted but not yet filled
    Pending,
    /// Completely filled
    Filled,
    /// Refused by the exchange
    Rejected,
    /// Could not be delivered to the exchange
    Failed,
}

impl OrderStatus {
    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Rejected => write!(f, "rejected"),
            OrderStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Market order handed to the exchange.
///
/// `client_order_id` stays the same across retries so the exchange can
/// discard duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    /// Symbol to trade
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Base asset quantity
    pub quantity: Decimal,
    /// Client-provided order ID
    pub client_order_id: String,
}

impl MarketOrderRequest {
    /// Create a market order request with a fresh client order id.
    pub fn new(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            client_order_id: new_client_order_id(),
        }
    }
}

/// Binance accepts client ids up to 36 characters from `[.A-Z:/a-z0-9_-]`.
fn new_client_order_id() -> String {
    format!("mac-{}", Uuid::new_v4().simple())
        .chars()
        .take(36)
        .collect()
}

/// The exchange's answer to an order submission or query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub exchange_order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
}

/// An order tracked by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID
    pub id: Uuid,
    /// Client-provided order ID
    pub client_order_id: String,
    /// Exchange-assigned ID, once known
    pub exchange_order_id: Option<String>,
    /// Symbol traded
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Requested quantity
    pub quantity: Decimal,
    /// Quantity executed so far
    pub executed_quantity: Decimal,
    /// Current status
    pub status: OrderStatus,
    /// Why the order ended up rejected or failed
    pub reason: Option<String>,
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// When the order was last updated
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order from a request.
    pub fn from_request(request: &MarketOrderRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_order_id: request.client_order_id.clone(),
            exchange_order_id: None,
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            executed_quantity: Decimal::ZERO,
            status: OrderStatus::Pending,
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the order to a new status.
    ///
    /// Only pending orders change; returns `false` once the order is terminal.
    pub fn transition(&mut self, status: OrderStatus, reason: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        if reason.is_some() {
            self.reason = reason;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Apply the exchange's view of this order.
    pub fn apply_receipt(&mut self, receipt: &OrderReceipt) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.exchange_order_id = Some(receipt.exchange_order_id.clone());
        self.executed_quantity = receipt.executed_quantity;
        self.transition(receipt.status, None)
    }
}
