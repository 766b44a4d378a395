//! Deterministic replay of historical data through the provider interface.
//!
//! [`BacktestClient`] fills market orders at the last replayed mid price and
//! nets them per instrument. Its streamer merges all candle and tick series
//! into one timeline ordered by timestamp.

mod client;
mod loader;
mod report;
mod streamer;

pub use client::{BacktestClient, CandleSeries, MarketSeries};
pub use loader::{load_candles_csv, load_ticks_csv, read_candles, read_ticks};
pub use report::{BacktestReport, EquityPoint};
pub use streamer::{parse_timestamp, BacktestStreamer};
