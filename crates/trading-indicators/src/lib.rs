//! Moving average indicators.
//!
//! All calculations run on `Decimal` closing prices so that averages compare
//! exactly; an equal short and long average must produce a hold, not a
//! rounding-dependent buy or sell.

pub mod moving_average;

pub use moving_average::{moving_average, Sma};
