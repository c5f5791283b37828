//! Market data for trading.

mod feed;

pub use feed::{MarketDataFeed, DEFAULT_FETCH_TIMEOUT};
