//! Error types for the trading bot.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Top-level trading error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Strategy configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors reported by the exchange collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request rejected: {0}")]
    Validation(String),

    /// The exchange has no order under the queried client order id.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ExchangeError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::Transport(_)
            | ExchangeError::Timeout(_)
            | ExchangeError::RateLimited(_) => true,
            ExchangeError::Api { status, .. } => *status >= 500,
            ExchangeError::Auth(_)
            | ExchangeError::Validation(_)
            | ExchangeError::OrderNotFound(_)
            | ExchangeError::Decode(_) => false,
        }
    }
}

/// Market data could not be obtained for this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Data unavailable for {symbol}: {reason}")]
    Unavailable { symbol: String, reason: String },
}

impl DataError {
    pub fn unavailable(symbol: impl Into<String>, reason: impl ToString) -> Self {
        DataError::Unavailable {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }
}

/// Indicator calculation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Position sizing errors. Always a configuration problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("Invalid risk: {0}")]
    InvalidRisk(String),
}

/// Order dispatch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Transport-level failure that survived every retry.
    #[error("Dispatch failed for {symbol} after {attempts} attempt(s): {reason}")]
    DispatchFailed {
        symbol: String,
        attempts: u32,
        reason: String,
    },

    /// The exchange refused the order. Retrying it unchanged is pointless.
    #[error("Order rejected for {symbol}: {reason}")]
    Rejected { symbol: String, reason: String },

    /// Submission failed and the exchange could not say whether the order
    /// exists. The order stays pending until reconciled.
    #[error("Order {client_order_id} for {symbol} is unconfirmed: {reason}")]
    Unconfirmed {
        symbol: String,
        client_order_id: String,
        reason: String,
    },

    #[error("Order {client_order_id} is still pending for {symbol}")]
    OrderInFlight {
        symbol: String,
        client_order_id: String,
    },

    #[error("Quantity {quantity} for {symbol} does not exceed the minimum lot size {min_lot_size}")]
    BelowMinimumLot {
        symbol: String,
        quantity: Decimal,
        min_lot_size: Decimal,
    },
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::DispatchFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_retryable() {
        assert!(ExchangeError::Transport("reset".into()).is_retryable());
        assert!(ExchangeError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ExchangeError::Api { status: 503, message: "busy".into() }.is_retryable());
        assert!(!ExchangeError::Api { status: 400, message: "bad".into() }.is_retryable());
        assert!(!ExchangeError::Validation("LOT_SIZE".into()).is_retryable());
        assert!(!ExchangeError::Auth("bad key".into()).is_retryable());
        assert!(!ExchangeError::OrderNotFound("mac-1".into()).is_retryable());
    }

    #[test]
    fn test_dispatch_error_retryable() {
        let failed = DispatchError::DispatchFailed {
            symbol: "BTCUSDT".into(),
            attempts: 3,
            reason: "timeout".into(),
        };
        let rejected = DispatchError::Rejected {
            symbol: "BTCUSDT".into(),
            reason: "invalid quantity".into(),
        };
        assert!(failed.is_retryable());
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_data_error_display() {
        let err = DataError::unavailable("BTCUSDT", "got 10 of 50 bars");
        assert_eq!(err.to_string(), "Data unavailable for BTCUSDT: got 10 of 50 bars");
    }
}
