//! Trading signal generation.
//!
//! This crate provides the moving average crossover signal engine: a short
//! and a long simple moving average of closing prices are compared on every
//! evaluation and classified into buy, sell or hold.

mod ma_crossover;

pub use ma_crossover::{classify, evaluate, MACrossoverConfig, MACrossoverStrategy};
