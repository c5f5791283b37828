//! Indicator trait definitions.

use crate::error::IndicatorError;
use rust_decimal::Decimal;

/// Trait for technical indicators over decimal price series.
///
/// Indicators process price data and produce derived values
/// useful for trading decisions.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values for the given data.
    ///
    /// # Arguments
    /// * `data` - Input data (typically closing prices, oldest first)
    ///
    /// # Returns
    /// A vector of indicator values, empty when there is not enough data
    fn calculate(&self, data: &[Decimal]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[Decimal]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }
}
