use common::{Candle, Error, Result};

use super::Indicator;

/// On-Balance Volume. Starts at 0 and adds or subtracts the candle's volume
/// on an up or down close. The first candle only records the close.
#[derive(Debug, Clone, Default)]
pub struct Obv {
    prev_close: Option<f64>,
    obv: Option<f64>,
}

impl Obv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for Obv {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        if candle.volume < 0.0 {
            return Err(Error::NegativeVolume(candle.volume));
        }

        let Some(prev_close) = self.prev_close.replace(candle.close) else {
            return Ok(None);
        };

        let obv = self.obv.unwrap_or(0.0);
        let next = if candle.close > prev_close {
            obv + candle.volume
        } else if candle.close < prev_close {
            obv - candle.volume
        } else {
            obv
        };
        self.obv = Some(next);
        Ok(self.obv)
    }

    fn ready(&self) -> bool {
        self.obv.is_some()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.obv = None;
    }

    fn warmup_periods(&self) -> usize {
        2
    }

    fn name(&self) -> String {
        "OBV".to_string()
    }
}
