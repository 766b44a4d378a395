use common::{Candle, Result};

use super::{require_period, Indicator, Window};

/// Williams %R, ranging from -100 (close at the period low) to 0 (at the high).
#[derive(Debug, Clone)]
pub struct WilliamsR {
    period: usize,
    highs: Window,
    lows: Window,
}

impl WilliamsR {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            highs: Window::new(period),
            lows: Window::new(period),
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for WilliamsR {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        self.highs.push(candle.high);
        self.lows.push(candle.low);
        if !self.ready() {
            return Ok(None);
        }

        let highest = self.highs.max();
        let lowest = self.lows.min();
        if highest == lowest {
            return Ok(Some(-50.0));
        }
        Ok(Some((highest - candle.close) / (highest - lowest) * -100.0))
    }

    fn ready(&self) -> bool {
        self.highs.is_full()
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
    }

    fn warmup_periods(&self) -> usize {
        self.period
    }

    fn name(&self) -> String {
        format!("WilliamsR({})", self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, feed, hlc, make_candles, EPS};

    #[test]
    fn rejects_zero_period() {
        assert!(WilliamsR::new(0).is_err());
    }

    #[test]
    fn position_in_range() {
        // HH 13, LL 9, close 12
        let mut wr = WilliamsR::new(3).unwrap();
        let v = feed(&mut wr, &make_candles(&[10.0, 11.0, 12.0])).unwrap();
        assert_approx(v, -25.0, EPS);
    }

    #[test]
    fn extremes() {
        let mut wr = WilliamsR::new(2).unwrap();
        assert_eq!(feed(&mut wr, &[hlc(10.0, 5.0, 6.0), hlc(9.0, 6.0, 10.0)]), Some(0.0));
        wr.reset();
        assert_eq!(feed(&mut wr, &[hlc(10.0, 5.0, 6.0), hlc(9.0, 6.0, 5.0)]), Some(-100.0));
    }

    #[test]
    fn zero_range_is_midpoint() {
        let mut wr = WilliamsR::new(2).unwrap();
        assert_eq!(feed(&mut wr, &[hlc(5.0, 5.0, 5.0), hlc(5.0, 5.0, 5.0)]), Some(-50.0));
    }

    #[test]
    fn none_during_warmup() {
        let mut wr = WilliamsR::new(14).unwrap();
        assert_eq!(feed(&mut wr, &make_candles(&[1.0; 13])), None);
        assert!(!wr.ready());
    }
}
