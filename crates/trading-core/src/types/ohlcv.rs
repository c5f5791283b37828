//! OHLCV (Open, High, Low, Close, Volume) data types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single candle as returned by the exchange.
///
/// Prices are kept as `Decimal` exactly as quoted; bars are never mutated
/// after they have been fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Open time, Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Opening price
    pub open: Decimal,
    /// Highest price
    pub high: Decimal,
    /// Lowest price
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Base asset volume
    pub volume: Decimal,
}

impl Bar {
    /// Create a new bar.
    pub fn new(
        timestamp: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Create a flat bar where every price equals `close`.
    pub fn from_close(timestamp: i64, close: Decimal) -> Self {
        Self::new(timestamp, close, close, close, close, Decimal::ZERO)
    }
}

/// Extract the closing prices of a bar slice, oldest first.
pub fn closes(bars: &[Bar]) -> Vec<Decimal> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_close() {
        let bar = Bar::from_close(1_000, dec!(42.5));
        assert_eq!(bar.open, dec!(42.5));
        assert_eq!(bar.close, dec!(42.5));
        assert_eq!(bar.volume, Decimal::ZERO);
    }

    #[test]
    fn test_closes_keep_order() {
        let bars: Vec<Bar> = [dec!(1), dec!(2), dec!(3)]
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::from_close(i as i64, c))
            .collect();
        assert_eq!(closes(&bars), vec![dec!(1), dec!(2), dec!(3)]);
    }
}
