//! Tradable market description.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A spot market and the exchange's lot rules for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Exchange symbol, e.g. `BTCUSDT`
    pub symbol: String,
    /// Asset bought and sold, e.g. `BTC`
    pub base_asset: String,
    /// Asset used to pay, e.g. `USDT`
    pub quote_asset: String,
    /// Orders must exceed this quantity
    #[serde(default)]
    pub min_lot_size: Decimal,
    /// Quantity increment; zero disables rounding
    #[serde(default)]
    pub lot_step: Decimal,
}

impl Market {
    pub fn new(
        symbol: impl Into<String>,
        base_asset: impl Into<String>,
        quote_asset: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            base_asset: base_asset.into(),
            quote_asset: quote_asset.into(),
            min_lot_size: Decimal::ZERO,
            lot_step: Decimal::ZERO,
        }
    }

    pub fn with_min_lot_size(mut self, min_lot_size: Decimal) -> Self {
        self.min_lot_size = min_lot_size;
        self
    }

    pub fn with_lot_step(mut self, lot_step: Decimal) -> Self {
        self.lot_step = lot_step;
        self
    }

    /// Round a quantity down to the lot step.
    pub fn round_to_step(&self, quantity: Decimal) -> Decimal {
        if self.lot_step <= Decimal::ZERO {
            return quantity;
        }
        ((quantity / self.lot_step).floor() * self.lot_step).normalize()
    }
}

impl Default for Market {
    fn default() -> Self {
        Self::new("BTCUSDT", "BTC", "USDT")
    }
}
