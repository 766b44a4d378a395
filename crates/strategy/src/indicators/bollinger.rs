use common::{Candle, Result};

use super::{require_period, require_positive, Indicator, Reading, Window};

/// Bollinger Bands: rolling SMA ± k × population standard deviation (ddof = 0).
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    k: f64,
    closes: Window,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BollingerReading {
    pub middle: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
    pub std: Option<f64>,
}

impl Reading for BollingerReading {
    fn is_complete(&self) -> bool {
        self.middle.is_some() && self.upper.is_some() && self.lower.is_some() && self.std.is_some()
    }
}

impl BollingerBands {
    pub fn new(period: usize, k: f64) -> Result<Self> {
        let period = require_period("period", period)?;
        let k = require_positive("k", k)?;
        Ok(Self {
            period,
            k,
            closes: Window::new(period),
        })
    }
}

impl Indicator for BollingerBands {
    type Output = BollingerReading;

    fn update(&mut self, candle: &Candle) -> Result<BollingerReading> {
        self.closes.push(candle.close);
        if !self.ready() {
            return Ok(BollingerReading::default());
        }

        let n = self.period as f64;
        let mean = self.closes.sum() / n;
        let var = self
            .closes
            .iter()
            .fold(0.0, |acc, x| acc + (x - mean).powi(2))
            / n;
        let std = var.sqrt();

        Ok(BollingerReading {
            middle: Some(mean),
            upper: Some(mean + self.k * std),
            lower: Some(mean - self.k * std),
            std: Some(std),
        })
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
        format!("BB({},{})", self.period, self.k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, feed, make_candles, EPS};

    #[test]
    fn rejects_bad_parameters() {
        assert!(BollingerBands::new(0, 2.0).is_err());
        assert!(BollingerBands::new(20, 0.0).is_err());
        assert!(BollingerBands::new(20, -1.0).is_err());
    }

    #[test]
    fn two_period_bands() {
        let mut bb = BollingerBands::new(2, 2.0).unwrap();
        let candles = make_candles(&[10.0, 14.0]);
        assert_eq!(bb.update(&candles[0]).unwrap(), BollingerReading::default());
        let r = bb.update(&candles[1]).unwrap();
        assert_approx(r.middle.unwrap(), 12.0, EPS);
        assert_approx(r.std.unwrap(), 2.0, EPS);
        assert_approx(r.upper.unwrap(), 16.0, EPS);
        assert_approx(r.lower.unwrap(), 8.0, EPS);
    }

    #[test]
    fn statistics_cover_only_the_latest_window() {
        let mut bb = BollingerBands::new(2, 2.0).unwrap();
        let r = feed(&mut bb, &make_candles(&[1000.0, 10.0, 14.0]));
        assert_approx(r.middle.unwrap(), 12.0, EPS);
        assert_approx(r.std.unwrap(), 2.0, EPS);
    }

    #[test]
    fn flat_series_collapses_bands() {
        let mut bb = BollingerBands::new(3, 2.0).unwrap();
        let r = feed(&mut bb, &make_candles(&[5.0, 5.0, 5.0]));
        assert_eq!(r.std, Some(0.0));
        assert_eq!(r.upper, r.lower);
    }
}
