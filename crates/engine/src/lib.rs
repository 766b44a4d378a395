pub mod backtest;

pub use backtest::{BacktestClient, BacktestReport, BacktestStreamer};
