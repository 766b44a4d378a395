//! Relative Strength Index with Wilder smoothing.
//!
//! The first reading needs `period` close-to-close deltas, i.e. `period + 1`
//! candles. Average gain/loss are seeded with the mean of those deltas and
//! smoothed with `avg = (avg * (period - 1) + x) / period` afterwards.

use common::{Candle, Result};

use super::{require_period, Indicator};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    seed_gain_sum: f64,
    seed_loss_sum: f64,
    /// Deltas processed so far (candles - 1).
    deltas: usize,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            prev_close: None,
            seed_gain_sum: 0.0,
            seed_loss_sum: 0.0,
            deltas: 0,
            avg_gain: None,
            avg_loss: None,
        })
    }

    fn compute(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        if avg_gain == 0.0 {
            return 0.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Indicator for Rsi {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        let close = candle.close;
        let Some(prev_close) = self.prev_close.replace(close) else {
            return Ok(None);
        };

        let delta = close - prev_close;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        self.deltas += 1;

        let period = self.period as f64;
        let (avg_gain, avg_loss) = match (self.avg_gain, self.avg_loss) {
            (Some(g), Some(l)) => (
                (g * (period - 1.0) + gain) / period,
                (l * (period - 1.0) + loss) / period,
            ),
            _ => {
                self.seed_gain_sum += gain;
                self.seed_loss_sum += loss;
                if self.deltas < self.period {
                    return Ok(None);
                }
                (self.seed_gain_sum / period, self.seed_loss_sum / period)
            }
        };

        self.avg_gain = Some(avg_gain);
        self.avg_loss = Some(avg_loss);
        Ok(Some(Self::compute(avg_gain, avg_loss)))
    }

    fn ready(&self) -> bool {
        self.avg_gain.is_some() && self.avg_loss.is_some()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.seed_gain_sum = 0.0;
        self.seed_loss_sum = 0.0;
        self.deltas = 0;
        self.avg_gain = None;
        self.avg_loss = None;
    }

    fn warmup_periods(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> String {
        format!("RSI({})", self.period)
    }
}
