//! Average True Range with Wilder smoothing.
//!
//! TR = max(high - low, |high - prev_close|, |low - prev_close|); the very
//! first candle has no previous close and uses high - low alone.
//! ATR is seeded with the mean of the first `period` TRs, then
//! `atr = (atr * (period - 1) + tr) / period`.

use common::{Candle, Result};

use super::{require_period, Indicator, Window};

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    trs: Window,
    prev_close: Option<f64>,
    atr: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            trs: Window::new(period),
            prev_close: None,
            atr: None,
        })
    }
}

/// True range against an optional previous close.
pub(crate) fn true_range(candle: &Candle, prev_close: Option<f64>) -> f64 {
    let hl = candle.high - candle.low;
    match prev_close {
        None => hl,
        Some(pc) => hl
            .max((candle.high - pc).abs())
            .max((candle.low - pc).abs()),
    }
}

impl Indicator for Atr {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        let tr = true_range(candle, self.prev_close);
        self.trs.push(tr);
        self.prev_close = Some(candle.close);

        if !self.ready() {
            return Ok(None);
        }

        let period = self.period as f64;
        let atr = match self.atr {
            None => self.trs.sum() / period,
            Some(prev) => (prev * (period - 1.0) + tr) / period,
        };
        self.atr = Some(atr);
        Ok(Some(atr))
    }

    fn ready(&self) -> bool {
        self.trs.is_full()
    }

    fn reset(&mut self) {
        self.trs.clear();
        self.prev_close = None;
        self.atr = None;
    }

    fn warmup_periods(&self) -> usize {
        self.period
    }

    fn name(&self) -> String {
        format!("ATR({})", self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, hlc, EPS};

    #[test]
    fn rejects_zero_period() {
        assert!(Atr::new(0).is_err());
    }

    #[test]
    fn first_tr_ignores_missing_prev_close() {
        assert_eq!(true_range(&hlc(12.0, 9.0, 10.0), None), 3.0);
        // gap up: |high - prev_close| dominates
        assert_eq!(true_range(&hlc(20.0, 19.0, 19.5), Some(10.0)), 10.0);
        // gap down: |low - prev_close| dominates
        assert_eq!(true_range(&hlc(6.0, 5.0, 5.5), Some(10.0)), 5.0);
    }

    #[test]
    fn seed_is_mean_then_wilder_step() {
        let mut atr = Atr::new(3).unwrap();
        // TRs: 2 (h-l), max(2, |12-10|, |10-10|)=2, max(4, |14-11|, |10-11|)=4
        let candles = [hlc(11.0, 9.0, 10.0), hlc(12.0, 10.0, 11.0), hlc(14.0, 10.0, 13.0)];
        assert_eq!(atr.update(&candles[0]).unwrap(), None);
        assert_eq!(atr.update(&candles[1]).unwrap(), None);
        let seed = atr.update(&candles[2]).unwrap().unwrap();
        assert_approx(seed, 8.0 / 3.0, EPS);

        // next TR = max(1, |14-13|, |13-13|) = 1
        let next = atr.update(&hlc(14.0, 13.0, 13.5)).unwrap().unwrap();
        assert_approx(next, (seed * 2.0 + 1.0) / 3.0, EPS);
    }
}
