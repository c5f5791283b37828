//! Position sizing.

use rust_decimal::Decimal;
use tracing::debug;
use trading_core::error::RiskError;
use trading_core::types::{AccountSnapshot, Market, Side};

/// Quantity to commit: `balance * risk_fraction`.
///
/// Requires `0 <= risk_fraction <= 1` and a non-negative balance.
pub fn position_size(balance: Decimal, risk_fraction: Decimal) -> Result<Decimal, RiskError> {
    validate_fraction(risk_fraction)?;
    if balance < Decimal::ZERO {
        return Err(RiskError::InvalidRisk(format!(
            "Balance must not be negative, got {}",
            balance
        )));
    }
    Ok(balance * risk_fraction)
}

fn validate_fraction(risk_fraction: Decimal) -> Result<(), RiskError> {
    if risk_fraction < Decimal::ZERO || risk_fraction > Decimal::ONE {
        return Err(RiskError::InvalidRisk(format!(
            "Risk fraction must be between 0 and 1, got {}",
            risk_fraction
        )));
    }
    Ok(())
}

/// Position sizer calculates the order quantity for a signal.
///
/// Only built through [`RiskSizer::new`], so the fraction is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskSizer {
    risk_fraction: Decimal,
}

impl RiskSizer {
    /// Create a new position sizer.
    pub fn new(risk_fraction: Decimal) -> Result<Self, RiskError> {
        validate_fraction(risk_fraction)?;
        Ok(Self { risk_fraction })
    }

    /// Base asset quantity for an order on `market`.
    ///
    /// Buys spend a fraction of the free quote balance, converted at
    /// `last_close`; sells part with a fraction of the free base balance.
    /// The result is rounded down to the market's lot step.
    pub fn order_quantity(
        &self,
        side: Side,
        account: &AccountSnapshot,
        market: &Market,
        last_close: Decimal,
    ) -> Result<Decimal, RiskError> {
        let quantity = match side {
            Side::Buy => {
                if last_close <= Decimal::ZERO {
                    return Ok(Decimal::ZERO);
                }
                let notional =
                    position_size(account.free(&market.quote_asset), self.risk_fraction)?;
                notional / last_close
            }
            Side::Sell => position_size(account.free(&market.base_asset), self.risk_fraction)?,
        };

        let rounded = market.round_to_step(quantity);
        debug!(
            symbol = %market.symbol,
            side = %side,
            raw = %quantity,
            quantity = %rounded,
            "Order sized"
        );
        Ok(rounded)
    }
}
