//! Account balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free and locked amounts of a single asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn new(free: Decimal, locked: Decimal) -> Self {
        Self { free, locked }
    }
}

/// Point-in-time view of the account's balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Map of asset to balance
    pub balances: HashMap<String, Balance>,
    /// When the snapshot was taken
    pub fetched_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn new(balances: HashMap<String, Balance>) -> Self {
        Self {
            balances,
            fetched_at: Utc::now(),
        }
    }

    /// Free balance of an asset, zero when the account does not hold it.
    pub fn free(&self, asset: &str) -> Decimal {
        self.balances
            .get(asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO)
    }
}

impl Default for AccountSnapshot {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl FromIterator<(String, Balance)> for AccountSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, Balance)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
