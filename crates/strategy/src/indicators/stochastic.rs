use common::{Candle, Result};

use super::{require_period, Indicator, Reading, Window};

/// Stochastic Oscillator.
///
/// %K = 100 × (close − lowest low) / (highest high − lowest low) over `k_period`,
/// %D = SMA(%K, `d_period`). A zero high-low range gives %K = 0.0.
#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
    highs: Window,
    lows: Window,
    closes: Window,
    ks: Window,
}

/// `k` becomes available before `d`; `ready()` waits for both.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StochasticReading {
    pub k: Option<f64>,
    pub d: Option<f64>,
}

impl Reading for StochasticReading {
    fn is_complete(&self) -> bool {
        self.k.is_some() && self.d.is_some()
    }
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize) -> Result<Self> {
        let k_period = require_period("k_period", k_period)?;
        let d_period = require_period("d_period", d_period)?;
        Ok(Self {
            k_period,
            d_period,
            highs: Window::new(k_period),
            lows: Window::new(k_period),
            closes: Window::new(k_period),
            ks: Window::new(d_period),
        })
    }
}

impl Indicator for Stochastic {
    type Output = StochasticReading;

    fn update(&mut self, candle: &Candle) -> Result<StochasticReading> {
        self.highs.push(candle.high);
        self.lows.push(candle.low);
        self.closes.push(candle.close);

        if !self.closes.is_full() {
            return Ok(StochasticReading::default());
        }

        let highest_high = self.highs.max();
        let lowest_low = self.lows.min();
        let denom = highest_high - lowest_low;
        let k = if denom == 0.0 {
            0.0
        } else {
            100.0 * (candle.close - lowest_low) / denom
        };
        self.ks.push(k);

        if !self.ks.is_full() {
            return Ok(StochasticReading { k: Some(k), d: None });
        }

        let d = self.ks.sum() / self.d_period as f64;
        Ok(StochasticReading {
            k: Some(k),
            d: Some(d),
        })
    }

    fn ready(&self) -> bool {
        self.closes.is_full() && self.ks.is_full()
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.closes.clear();
        self.ks.clear();
    }

    fn warmup_periods(&self) -> usize {
        self.k_period + self.d_period - 1
    }

    fn name(&self) -> String {
        format!("STOCH({},{})", self.k_period, self.d_period)
    }
}
