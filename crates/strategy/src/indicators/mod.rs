//! Streaming technical indicators.
//!
//! Every indicator is a small state machine fed one completed candle at a
//! time. It keeps only the statistics its recurrence needs (a bounded window
//! or a few running scalars), never the full candle history, so feeding the
//! same candles live or from history produces identical readings.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod macd;
pub mod mfi;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod vwap;
pub mod williams_r;

use std::collections::VecDeque;

use common::{Candle, Error, Result};

pub use adx::{Adx, AdxReading};
pub use atr::Atr;
pub use bollinger::{BollingerBands, BollingerReading};
pub use cci::Cci;
pub use ema::Ema;
pub use macd::{Macd, MacdReading};
pub use mfi::Mfi;
pub use obv::Obv;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stochastic::{Stochastic, StochasticReading};
pub use vwap::Vwap;
pub use williams_r::WilliamsR;

/// Shared capability of all indicators.
pub trait Indicator: Send + 'static {
    /// `Option<f64>` for single-value indicators, a struct of optional
    /// fields for multi-output ones.
    type Output: Reading;

    /// Consume one new candle and return the current reading.
    ///
    /// Candles must arrive in increasing timestamp order.
    fn update(&mut self, candle: &Candle) -> Result<Self::Output>;

    /// True once enough candles have been consumed for every output to exist.
    fn ready(&self) -> bool;

    /// Return to the just-constructed state.
    fn reset(&mut self);

    /// Completed candles needed before `ready()` first becomes true.
    fn warmup_periods(&self) -> usize;

    /// Short label for logs, e.g. `RSI(14)`.
    fn name(&self) -> String;
}

/// A reading that may still be incomplete during warm-up.
pub trait Reading: Clone + std::fmt::Debug + Send {
    /// True when every field of the reading is available.
    fn is_complete(&self) -> bool;
}

impl Reading for Option<f64> {
    fn is_complete(&self) -> bool {
        self.is_some()
    }
}

pub(crate) fn require_period(name: &'static str, period: usize) -> Result<usize> {
    if period == 0 {
        return Err(Error::invalid(name, 0.0));
    }
    Ok(period)
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64> {
    // NaN fails this comparison too
    if !(value > 0.0) {
        return Err(Error::invalid(name, value));
    }
    Ok(value)
}

/// Fixed-capacity sliding window; the oldest value is evicted on overflow.
#[derive(Debug, Clone)]
pub(crate) struct Window {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Window {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Left-to-right sum, oldest first.
    pub(crate) fn sum(&self) -> f64 {
        self.values.iter().fold(0.0, |acc, v| acc + v)
    }

    pub(crate) fn mean(&self) -> f64 {
        self.sum() / self.values.len() as f64
    }

    pub(crate) fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub(crate) fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub(crate) fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Second most recent value.
    pub(crate) fn previous(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        self.values.get(n - 2).copied()
    }
}

/// Synthetic candles for tests: high = close + 1, low = close - 1, volume = 100.
#[cfg(test)]
pub(crate) fn make_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new(
                format!("2025-01-01T00:{:02}:00Z", i % 60),
                close,
                close + 1.0,
                close - 1.0,
                close,
            )
            .with_volume(100.0)
            .with_tick_count(10)
        })
        .collect()
}

/// Candle with explicit high/low/close, open = close.
#[cfg(test)]
pub(crate) fn hlc(high: f64, low: f64, close: f64) -> Candle {
    Candle::new("2025-01-01T00:00:00Z", close, high, low, close)
}

/// Feed every candle and return the last reading.
#[cfg(test)]
pub(crate) fn feed<I: Indicator>(indicator: &mut I, candles: &[Candle]) -> I::Output {
    let mut last = None;
    for candle in candles {
        last = Some(indicator.update(candle).unwrap());
    }
    last.expect("feed needs at least one candle")
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub(crate) const EPS: f64 = 1e-9;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest() {
        let mut w = Window::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert!(w.is_full());
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(w.sum(), 9.0);
        assert_eq!(w.max(), 4.0);
        assert_eq!(w.min(), 2.0);
        assert_eq!(w.last(), Some(4.0));
        assert_eq!(w.previous(), Some(3.0));
    }

    #[test]
    fn positive_checks_reject_zero_and_nan() {
        assert!(require_period("period", 0).is_err());
        assert!(require_period("period", 1).is_ok());
        assert!(require_positive("k", 0.0).is_err());
        assert!(require_positive("k", -1.0).is_err());
        assert!(require_positive("k", f64::NAN).is_err());
        assert!(require_positive("k", 0.5).is_ok());
    }
}
