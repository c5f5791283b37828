//! Risk management for trading.
//!
//! Converts account balances into order quantities.

mod position_sizer;

pub use position_sizer::{position_size, RiskSizer};
