//! Logging setup for the trading bot.

mod logging;

pub use logging::{setup_logging, LogGuard};
