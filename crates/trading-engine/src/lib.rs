//! Trading loop and market task runner.

mod runner;
mod shutdown;
mod trading_loop;

pub use runner::run_markets;
pub use shutdown::{Shutdown, ShutdownHandle};
pub use trading_loop::{CycleOutcome, LoopConfig, LoopState, LoopSummary, TradingLoop};
