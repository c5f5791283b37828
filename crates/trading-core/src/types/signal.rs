//! Trading signals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Side;

/// Outcome of comparing the short and long moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Classify a pair of averages.
    ///
    /// Short above long is a buy, short below long is a sell, equality holds.
    pub fn from_averages(short_avg: Decimal, long_avg: Decimal) -> Self {
        match short_avg.cmp(&long_avg) {
            std::cmp::Ordering::Greater => Signal::Buy,
            std::cmp::Ordering::Less => Signal::Sell,
            std::cmp::Ordering::Equal => Signal::Hold,
        }
    }

    /// The order side this signal asks for, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Signal::Buy => Some(Side::Buy),
            Signal::Sell => Some(Side::Sell),
            Signal::Hold => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.side().is_some()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "buy"),
            Signal::Sell => write!(f, "sell"),
            Signal::Hold => write!(f, "hold"),
        }
    }
}

/// A signal together with the averages it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossover {
    pub signal: Signal,
    pub short_avg: Decimal,
    pub long_avg: Decimal,
}

impl Crossover {
    pub fn new(short_avg: Decimal, long_avg: Decimal) -> Self {
        Self {
            signal: Signal::from_averages(short_avg, long_avg),
            short_avg,
            long_avg,
        }
    }
}
