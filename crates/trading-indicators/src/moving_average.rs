//! Moving average indicators.

use rust_decimal::Decimal;
use trading_core::error::IndicatorError;
use trading_core::traits::Indicator;
use trading_core::types::{closes, Bar};

/// Arithmetic mean of the closing prices of the most recent `window` bars.
///
/// Fails with `InsufficientData` when fewer than `window` bars are given and
/// with `InvalidParameter` for a zero window.
pub fn moving_average(bars: &[Bar], window: usize) -> Result<Decimal, IndicatorError> {
    let sma = Sma::new(window)?;
    sma.current(&closes(bars))
}

/// Simple Moving Average (SMA).
///
/// Calculates the arithmetic mean of the last N values.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// Create a new SMA with the specified period.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidParameter(
                "Period must be greater than 0".into(),
            ));
        }
        Ok(Self { period })
    }

    /// Average of the last `period` values.
    pub fn current(&self, data: &[Decimal]) -> Result<Decimal, IndicatorError> {
        self.validate_data(data)?;
        let window = &data[data.len() - self.period..];
        let sum: Decimal = window.iter().copied().sum();
        Ok(sum / Decimal::from(self.period))
    }
}

impl Indicator for Sma {
    type Output = Decimal;

    fn calculate(&self, data: &[Decimal]) -> Vec<Decimal> {
        if data.len() < self.period {
            return vec![];
        }

        let mut result = Vec::with_capacity(data.len() - self.period + 1);
        let period = Decimal::from(self.period);

        // Initial sum
        let mut sum: Decimal = data[..self.period].iter().copied().sum();
        result.push(sum / period);

        // Sliding window
        for i in self.period..data.len() {
            sum = sum - data[i - self.period] + data[i];
            result.push(sum / period);
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "SMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rust_decimal_macros::dec;

    fn bars(closes: &[Decimal]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::from_close(i as i64 * 60_000, c))
            .collect()
    }

    #[test]
    fn test_moving_average_uses_most_recent_window() {
        let series = bars(&[dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);
        assert_eq!(moving_average(&series, 3).unwrap(), dec!(4));
        assert_eq!(moving_average(&series, 5).unwrap(), dec!(3));
        assert_eq!(moving_average(&series, 1).unwrap(), dec!(5));
    }

    #[test]
    fn test_moving_average_insufficient_data() {
        let series = bars(&[dec!(1), dec!(2)]);
        assert_eq!(
            moving_average(&series, 3),
            Err(IndicatorError::InsufficientData {
                required: 3,
                available: 2
            })
        );
        assert!(moving_average(&[], 1).is_err());
    }

    #[test]
    fn test_moving_average_zero_window() {
        let series = bars(&[dec!(1)]);
        assert!(matches!(
            moving_average(&series, 0),
            Err(IndicatorError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_moving_average_matches_mean_of_last_window() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let len = rng.gen_range(1..80);
            let window = rng.gen_range(1..=len);
            let closes: Vec<Decimal> = (0..len)
                .map(|_| Decimal::new(rng.gen_range(1..10_000_000_i64), rng.gen_range(0..8)))
                .collect();

            let expected = closes[len - window..].iter().copied().sum::<Decimal>()
                / Decimal::from(window);

            assert_eq!(moving_average(&bars(&closes), window).unwrap(), expected);
        }
    }

    #[test]
    fn test_sma_series() {
        let sma = Sma::new(3).unwrap();
        let data = vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        let result = sma.calculate(&data);

        assert_eq!(result, vec![dec!(2), dec!(3), dec!(4)]);
        assert_eq!(sma.current(&data).unwrap(), *result.last().unwrap());
    }

    #[test]
    fn test_sma_insufficient_data() {
        let sma = Sma::new(5).unwrap();
        let data = vec![dec!(1), dec!(2), dec!(3)];

        assert!(sma.calculate(&data).is_empty());
        assert!(sma.current(&data).is_err());
    }
}
