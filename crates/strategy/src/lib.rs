//! Indicator library, chart history and strategy runtime.
//!
//! A strategy owns a [`StrategyContext`] holding its subscriptions, one
//! [`ChartHistory`] per chart and the indicators registered against each
//! chart. [`Dispatcher`] warms the context up from provider history, then
//! routes live or replayed events into the strategy callbacks.

pub mod chart;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod indicators;
pub mod registry;
pub mod warmup;

pub use chart::ChartHistory;
pub use config::{IndicatorConfig, StrategyConfig, StrategyFileConfig};
pub use context::{IndicatorHandle, StrategyContext};
pub use dispatch::{Dispatcher, Strategy};
pub use indicators::{Indicator, Reading};
pub use registry::{build_strategy, StrategyRegistry};
