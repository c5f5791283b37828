//! Core types and traits for the trading bot.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Bar, Timeframe)
//! - Signals, orders and account snapshots
//! - The error taxonomy shared by every component
//! - The exchange collaborator contract and the indicator trait

pub mod types;
pub mod traits;
pub mod error;

pub use error::TradingError;
pub use types::*;
pub use traits::*;
