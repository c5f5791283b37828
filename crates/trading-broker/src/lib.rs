//! Exchange integrations and order dispatch.

mod binance;
mod dispatcher;
mod paper;

pub use binance::{BinanceClient, BinanceConfig, DEFAULT_BASE_URL};
pub use dispatcher::{DispatcherConfig, OrderDispatcher};
pub use paper::{FillMode, PaperExchange};
