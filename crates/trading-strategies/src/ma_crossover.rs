//! Moving Average Crossover signal engine.
//!
//! Buys while the short SMA is above the long SMA, sells while it is below,
//! and holds when both are equal. Each evaluation looks only at the bars it
//! is given; there is no memory of the previous signal.

use serde::{Deserialize, Serialize};
use tracing::debug;
use trading_core::error::{IndicatorError, StrategyError};
use trading_core::types::{Bar, Crossover, Signal};
use trading_indicators::moving_average;

/// Configuration for the MA Crossover strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MACrossoverConfig {
    /// Short moving average window, in bars
    pub short_window: usize,
    /// Long moving average window, in bars
    pub long_window: usize,
}

impl Default for MACrossoverConfig {
    fn default() -> Self {
        Self {
            short_window: 20,
            long_window: 50,
        }
    }
}

impl MACrossoverConfig {
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, StrategyError> {
        let config = Self {
            short_window,
            long_window,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// A series long enough for the long window is then always long enough
    /// for the short one.
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.short_window == 0 {
            return Err(StrategyError::InvalidConfig(
                "Short window must be greater than 0".into(),
            ));
        }
        if self.short_window >= self.long_window {
            return Err(StrategyError::InvalidConfig(format!(
                "Short window ({}) must be less than long window ({})",
                self.short_window, self.long_window
            )));
        }
        Ok(())
    }

    /// Number of bars an evaluation needs.
    pub fn bars_required(&self) -> usize {
        self.long_window
    }
}

/// Compare the short and long moving averages of `bars`.
pub fn evaluate(
    bars: &[Bar],
    short_window: usize,
    long_window: usize,
) -> Result<Crossover, IndicatorError> {
    let short_avg = moving_average(bars, short_window)?;
    let long_avg = moving_average(bars, long_window)?;
    Ok(Crossover::new(short_avg, long_avg))
}

/// Classify the current signal of `bars`.
pub fn classify(
    bars: &[Bar],
    short_window: usize,
    long_window: usize,
) -> Result<Signal, IndicatorError> {
    evaluate(bars, short_window, long_window).map(|c| c.signal)
}

/// Moving Average Crossover Strategy.
#[derive(Debug, Clone)]
pub struct MACrossoverStrategy {
    config: MACrossoverConfig,
}

impl MACrossoverStrategy {
    /// Create a new MA Crossover strategy.
    pub fn new(config: MACrossoverConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn bars_required(&self) -> usize {
        self.config.bars_required()
    }

    /// Evaluate the latest bars.
    pub fn evaluate(&self, bars: &[Bar]) -> Result<Crossover, IndicatorError> {
        let crossover = evaluate(bars, self.config.short_window, self.config.long_window)?;

        debug!(
            short_avg = %crossover.short_avg,
            long_avg = %crossover.long_avg,
            signal = %crossover.signal,
            "Crossover evaluated"
        );
        Ok(crossover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn create_bars(prices: &[Decimal]) -> Vec<Bar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| Bar::from_close(i as i64 * 3_600_000, price))
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(MACrossoverConfig::default().validate().is_ok());
        assert!(MACrossoverConfig::new(3, 5).is_ok());
        assert!(MACrossoverConfig::new(0, 5).is_err());
        assert!(MACrossoverConfig::new(5, 5).is_err());
        assert!(MACrossoverConfig::new(30, 20).is_err());
    }

    #[test]
    fn test_classify_uptrend_is_buy() {
        let bars = create_bars(&[dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);
        // short = mean(4, 5) = 4.5, long = mean(1..5) = 3
        assert_eq!(classify(&bars, 2, 5).unwrap(), Signal::Buy);
    }

    #[test]
    fn test_classify_downtrend_is_sell() {
        let bars = create_bars(&[dec!(5), dec!(4), dec!(3), dec!(2), dec!(1)]);
        assert_eq!(classify(&bars, 2, 5).unwrap(), Signal::Sell);
    }

    #[test]
    fn test_classify_flat_is_hold() {
        let bars = create_bars(&[dec!(7); 6]);
        assert_eq!(classify(&bars, 3, 6).unwrap(), Signal::Hold);
    }

    #[test]
    fn test_classify_insufficient_data() {
        let bars = create_bars(&[dec!(1), dec!(2), dec!(3)]);
        assert_eq!(
            classify(&bars, 2, 5),
            Err(IndicatorError::InsufficientData {
                required: 5,
                available: 3
            })
        );
    }

    #[test]
    fn test_classify_is_deterministic_and_total() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let prices: Vec<Decimal> = (0..30)
                .map(|_| Decimal::new(rng.gen_range(90_00..110_00), 2))
                .collect();
            let bars = create_bars(&prices);

            let first = evaluate(&bars, 5, 30).unwrap();
            let second = evaluate(&bars, 5, 30).unwrap();
            assert_eq!(first, second);

            let expected = if first.short_avg > first.long_avg {
                Signal::Buy
            } else if first.short_avg < first.long_avg {
                Signal::Sell
            } else {
                Signal::Hold
            };
            assert_eq!(first.signal, expected);
        }
    }

    #[test]
    fn test_strategy_uses_configured_windows() {
        let strategy = MACrossoverStrategy::new(MACrossoverConfig::new(2, 4).unwrap()).unwrap();
        let bars = create_bars(&[dec!(10), dec!(10), dec!(11), dec!(12)]);

        let crossover = strategy.evaluate(&bars).unwrap();
        assert_eq!(crossover.short_avg, dec!(11.5));
        assert_eq!(crossover.long_avg, dec!(10.75));
        assert_eq!(crossover.signal, Signal::Buy);

        assert!(matches!(
            strategy.evaluate(&bars[..2]),
            Err(IndicatorError::InsufficientData { required: 4, available: 2 })
        ));
    }
}
