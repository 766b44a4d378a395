use common::{Candle, Result};

use super::{require_period, Indicator, Window};

/// Money Flow Index, a volume-weighted RSI over typical price (0..=100).
///
/// Candles with no reported volume fall back to their tick count. Returns
/// 100 when there is only positive flow and 50 when there is no flow at all.
#[derive(Debug, Clone)]
pub struct Mfi {
    period: usize,
    prev_tp: Option<f64>,
    positive: Window,
    negative: Window,
}

impl Mfi {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            prev_tp: None,
            positive: Window::new(period),
            negative: Window::new(period),
        })
    }
}

impl Indicator for Mfi {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        let tp = candle.typical_price();
        let volume = if candle.volume > 0.0 {
            candle.volume
        } else {
            candle.tick_count as f64
        };

        let Some(prev_tp) = self.prev_tp.replace(tp) else {
            return Ok(None);
        };

        let flow = tp * volume;
        let (pos, neg) = if tp > prev_tp {
            (flow, 0.0)
        } else if tp < prev_tp {
            (0.0, flow)
        } else {
            (0.0, 0.0)
        };
        self.positive.push(pos);
        self.negative.push(neg);

        if !self.ready() {
            return Ok(None);
        }

        let positive = self.positive.sum();
        let negative = self.negative.sum();
        if negative == 0.0 {
            return Ok(Some(if positive == 0.0 { 50.0 } else { 100.0 }));
        }
        Ok(Some(100.0 - 100.0 / (1.0 + positive / negative)))
    }

    fn ready(&self) -> bool {
        self.positive.is_full()
    }

    fn reset(&mut self) {
        self.prev_tp = None;
        self.positive.clear();
        self.negative.clear();
    }

    fn warmup_periods(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> String {
        format!("MFI({})", self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, feed, make_candles, EPS};

    fn tp_ticks(tp: f64, ticks: u64) -> Candle {
        Candle::new("2025-01-01T00:00:00Z", tp, tp, tp, tp).with_tick_count(ticks)
    }

    #[test]
    fn rejects_zero_period() {
        assert!(Mfi::new(0).is_err());
    }

    #[test]
    fn needs_period_plus_one_candles() {
        let mut mfi = Mfi::new(2).unwrap();
        assert_eq!(feed(&mut mfi, &make_candles(&[10.0, 11.0])), None);
        assert!(!mfi.ready());
        assert_eq!(mfi.update(&make_candles(&[12.0])[0]).unwrap(), Some(100.0));
        assert!(mfi.ready());
    }

    #[test]
    fn mixed_flows() {
        // +1100, -1000 -> ratio 1.1
        let mut mfi = Mfi::new(2).unwrap();
        let v = feed(&mut mfi, &make_candles(&[10.0, 11.0, 10.0])).unwrap();
        assert_approx(v, 100.0 - 100.0 / 2.1, EPS);
    }

    #[test]
    fn flat_prices_are_neutral() {
        let mut mfi = Mfi::new(3).unwrap();
        assert_eq!(feed(&mut mfi, &make_candles(&[5.0; 4])), Some(50.0));
    }

    #[test]
    fn tick_count_stands_in_for_missing_volume() {
        // +11*2 = 22, -10*4 = 40
        let mut mfi = Mfi::new(2).unwrap();
        let v = feed(&mut mfi, &[tp_ticks(10.0, 1), tp_ticks(11.0, 2), tp_ticks(10.0, 4)]);
        assert_approx(v.unwrap(), 100.0 - 100.0 / (1.0 + 22.0 / 40.0), EPS);
    }
}
