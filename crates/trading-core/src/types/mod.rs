//! Core data types for the trading bot.

mod account;
mod market;
mod ohlcv;
mod order;
mod signal;
mod timeframe;

pub use account::{AccountSnapshot, Balance};
pub use market::Market;
pub use ohlcv::{closes, Bar};
pub use order::{MarketOrderRequest, Order, OrderReceipt, OrderStatus, Side};
pub use signal::{Crossover, Signal};
pub use timeframe::Timeframe;
