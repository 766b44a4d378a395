use common::{Candle, Result};

use super::{require_period, Indicator, Reading, Window};

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// Computes: MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal_period),
/// Histogram = MACD line − Signal.
///
/// Each EMA is seeded with the SMA over its own period as soon as enough
/// values exist, and the seeding candle is immediately folded in with the
/// regular EMA step. Readings stay empty until the signal line is seeded.
#[derive(Debug, Clone)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    closes: Window,
    macd_values: Window,
    fast_ema: Option<f64>,
    slow_ema: Option<f64>,
    signal_ema: Option<f64>,
    fast_k: f64,
    slow_k: f64,
    signal_k: f64,
}

/// The result of a MACD update. All fields are `None` until the indicator is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacdReading {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

impl Reading for MacdReading {
    fn is_complete(&self) -> bool {
        self.macd.is_some() && self.signal.is_some() && self.histogram.is_some()
    }
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self> {
        let fast = require_period("fast", fast)?;
        let slow = require_period("slow", slow)?;
        let signal = require_period("signal", signal)?;
        Ok(Self {
            fast,
            slow,
            signal,
            closes: Window::new(fast.max(slow)),
            macd_values: Window::new(signal),
            fast_ema: None,
            slow_ema: None,
            signal_ema: None,
            fast_k: 2.0 / (fast as f64 + 1.0),
            slow_k: 2.0 / (slow as f64 + 1.0),
            signal_k: 2.0 / (signal as f64 + 1.0),
        })
    }

    /// Mean of the most recent `n` closes in the window.
    fn recent_mean(&self, n: usize) -> f64 {
        let skip = self.closes.len() - n;
        self.closes.iter().skip(skip).fold(0.0, |acc, v| acc + v) / n as f64
    }
}

fn ema_step(value: f64, prev: f64, k: f64) -> f64 {
    value * k + prev * (1.0 - k)
}

impl Indicator for Macd {
    type Output = MacdReading;

    fn update(&mut self, candle: &Candle) -> Result<MacdReading> {
        let close = candle.close;
        self.closes.push(close);

        if self.fast_ema.is_none() && self.closes.len() >= self.fast {
            self.fast_ema = Some(self.recent_mean(self.fast));
        }
        if self.slow_ema.is_none() && self.closes.len() >= self.slow {
            self.slow_ema = Some(self.recent_mean(self.slow));
        }

        self.fast_ema = self.fast_ema.map(|prev| ema_step(close, prev, self.fast_k));
        self.slow_ema = self.slow_ema.map(|prev| ema_step(close, prev, self.slow_k));

        let (Some(fast_ema), Some(slow_ema)) = (self.fast_ema, self.slow_ema) else {
            return Ok(MacdReading::default());
        };

        let macd_line = fast_ema - slow_ema;
        self.macd_values.push(macd_line);

        if self.signal_ema.is_none() && self.macd_values.is_full() {
            self.signal_ema = Some(self.macd_values.mean());
        }
        self.signal_ema = self
            .signal_ema
            .map(|prev| ema_step(macd_line, prev, self.signal_k));

        match self.signal_ema {
            None => Ok(MacdReading::default()),
            Some(signal) => Ok(MacdReading {
                macd: Some(macd_line),
                signal: Some(signal),
                histogram: Some(macd_line - signal),
            }),
        }
    }

    fn ready(&self) -> bool {
        self.fast_ema.is_some() && self.slow_ema.is_some() && self.signal_ema.is_some()
    }

    fn reset(&mut self) {
        self.closes.clear();
        self.macd_values.clear();
        self.fast_ema = None;
        self.slow_ema = None;
        self.signal_ema = None;
    }

    /// `slow + signal - 1`; the longer of the two EMAs when `fast > slow`.
    fn warmup_periods(&self) -> usize {
        self.fast.max(self.slow) + self.signal - 1
    }

    fn name(&self) -> String {
        format!("MACD({},{},{})", self.fast, self.slow, self.signal)
    }
}
