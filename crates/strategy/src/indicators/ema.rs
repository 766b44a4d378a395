use common::{Candle, Result};

use super::{require_period, Indicator};

/// Exponential Moving Average of close prices.
///
/// Seeded with the first close; readiness is count-based, so the first
/// reading arrives on the `period`-th candle.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    ema: Option<f64>,
    count: usize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            ema: None,
            count: 0,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Indicator for Ema {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        let close = candle.close;
        self.count += 1;

        let ema = match self.ema {
            None => close,
            Some(prev) => (close - prev) * self.alpha + prev,
        };
        self.ema = Some(ema);

        if !self.ready() {
            return Ok(None);
        }
        Ok(Some(ema))
    }

    fn ready(&self) -> bool {
        self.count >= self.period
    }

    fn reset(&mut self) {
        self.ema = None;
        self.count = 0;
    }

    fn warmup_periods(&self) -> usize {
        self.period
    }

    fn name(&self) -> String {
        format!("EMA({})", self.period)
    }
}
