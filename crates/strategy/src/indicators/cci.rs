use common::{Candle, Result};

use super::{require_period, Indicator, Window};

const LAMBERT: f64 = 0.015;

/// Commodity Channel Index: (TP − SMA(TP)) / (0.015 × mean deviation).
/// Returns 0.0 when the mean deviation is zero.
#[derive(Debug, Clone)]
pub struct Cci {
    period: usize,
    tps: Window,
}

impl Cci {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            tps: Window::new(period),
        })
    }
}

impl Indicator for Cci {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        let tp = candle.typical_price();
        self.tps.push(tp);
        if !self.ready() {
            return Ok(None);
        }

        let n = self.period as f64;
        let mean = self.tps.sum() / n;
        let mean_dev = self.tps.iter().fold(0.0, |acc, x| acc + (x - mean).abs()) / n;
        if mean_dev == 0.0 {
            return Ok(Some(0.0));
        }
        Ok(Some((tp - mean) / (LAMBERT * mean_dev)))
    }

    fn ready(&self) -> bool {
        self.tps.is_full()
    }

    fn reset(&mut self) {
        self.tps.clear();
    }

    fn warmup_periods(&self) -> usize {
        self.period
    }

    fn name(&self) -> String {
        format!("CCI({})", self.period)
    }
}
