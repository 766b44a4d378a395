use common::{Candle, Result};

use super::{require_period, Indicator, Window};

/// Simple Moving Average of close prices.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    closes: Window,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            closes: Window::new(period),
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        self.closes.push(candle.close);
        if !self.ready() {
            return Ok(None);
        }
        Ok(Some(self.closes.mean()))
    }

    fn ready(&self) -> bool {
        self.closes.is_full()
    }

    fn reset(&mut self) {
        self.closes.clear();
    }

    fn warmup_periods(&self) -> usize {
        self.period
    }

    fn name(&self) -> String {
        format!("SMA({})", self.period)
    }
}
