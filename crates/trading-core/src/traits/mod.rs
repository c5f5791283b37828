//! Core traits for the trading bot.

mod exchange;
mod indicator;

pub use exchange::ExchangeClient;
pub use indicator::Indicator;
