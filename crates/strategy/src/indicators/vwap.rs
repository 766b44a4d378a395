use common::{Candle, Error, Result};

use super::Indicator;

/// Session VWAP: Σ(price × volume) / Σ(volume).
///
/// Price is the typical price by default, or the close. With daily reset on,
/// the session key is the first 10 characters of the timestamp (`YYYY-MM-DD`)
/// and the accumulators restart whenever it changes.
#[derive(Debug, Clone)]
pub struct Vwap {
    use_typical_price: bool,
    reset_daily_utc: bool,
    session: Option<String>,
    cum_pv: f64,
    cum_v: f64,
}

impl Default for Vwap {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl Vwap {
    pub fn new(use_typical_price: bool, reset_daily_utc: bool) -> Self {
        Self {
            use_typical_price,
            reset_daily_utc,
            session: None,
            cum_pv: 0.0,
            cum_v: 0.0,
        }
    }

    fn session_key(timestamp: &str) -> &str {
        timestamp.get(..10).unwrap_or(timestamp)
    }

    fn roll_session(&mut self, timestamp: &str) {
        let key = Self::session_key(timestamp);
        if self.session.as_deref() != Some(key) {
            if self.session.is_some() {
                self.cum_pv = 0.0;
                self.cum_v = 0.0;
            }
            self.session = Some(key.to_string());
        }
    }
}

impl Indicator for Vwap {
    type Output = Option<f64>;

    fn update(&mut self, candle: &Candle) -> Result<Option<f64>> {
        if candle.volume < 0.0 {
            return Err(Error::NegativeVolume(candle.volume));
        }
        if self.reset_daily_utc {
            self.roll_session(&candle.timestamp);
        }

        let price = if self.use_typical_price {
            candle.typical_price()
        } else {
            candle.close
        };
        self.cum_pv += price * candle.volume;
        self.cum_v += candle.volume;

        if self.cum_v == 0.0 {
            return Ok(None);
        }
        Ok(Some(self.cum_pv / self.cum_v))
    }

    fn ready(&self) -> bool {
        self.cum_v > 0.0
    }

    fn reset(&mut self) {
        self.session = None;
        self.cum_pv = 0.0;
        self.cum_v = 0.0;
    }

    fn warmup_periods(&self) -> usize {
        1
    }

    fn name(&self) -> String {
        "VWAP".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, EPS};

    fn candle(ts: &str, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle::new(ts, close, high, low, close).with_volume(volume)
    }

    #[test]
    fn weights_typical_price_by_volume() {
        let mut vwap = Vwap::default();
        // TP 10 x 100, TP 20 x 300
        vwap.update(&candle("2025-01-01T00:00:00Z", 11.0, 9.0, 10.0, 100.0))
            .unwrap();
        let v = vwap
            .update(&candle("2025-01-01T00:01:00Z", 21.0, 19.0, 20.0, 300.0))
            .unwrap();
        assert_approx(v.unwrap(), 17.5, EPS);
    }

    #[test]
    fn close_basis_ignores_high_low() {
        let mut vwap = Vwap::new(false, true);
        let v = vwap
            .update(&candle("2025-01-01T00:00:00Z", 30.0, 0.0, 10.0, 5.0))
            .unwrap();
        assert_eq!(v, Some(10.0));
    }

    #[test]
    fn zero_volume_gives_no_value() {
        let mut vwap = Vwap::default();
        let v = vwap
            .update(&candle("2025-01-01T00:00:00Z", 11.0, 9.0, 10.0, 0.0))
            .unwrap();
        assert_eq!(v, None);
        assert!(!vwap.ready());
    }

    #[test]
    fn new_utc_day_restarts_session() {
        let mut vwap = Vwap::new(false, true);
        vwap.update(&candle("2025-01-01T23:59:00Z", 10.0, 10.0, 10.0, 100.0))
            .unwrap();
        let v = vwap
            .update(&candle("2025-01-02T00:00:00Z", 20.0, 20.0, 20.0, 1.0))
            .unwrap();
        assert_eq!(v, Some(20.0));
    }

    #[test]
    fn accumulates_across_days_without_daily_reset() {
        let mut vwap = Vwap::new(false, false);
        vwap.update(&candle("2025-01-01T23:59:00Z", 10.0, 10.0, 10.0, 1.0))
            .unwrap();
        let v = vwap
            .update(&candle("2025-01-02T00:00:00Z", 20.0, 20.0, 20.0, 1.0))
            .unwrap();
        assert_eq!(v, Some(15.0));
    }

    #[test]
    fn negative_volume_rejected_without_touching_state() {
        let mut vwap = Vwap::new(false, true);
        vwap.update(&candle("2025-01-01T00:00:00Z", 10.0, 10.0, 10.0, 1.0))
            .unwrap();
        let err = vwap
            .update(&candle("2025-01-02T00:00:00Z", 50.0, 50.0, 50.0, -1.0))
            .unwrap_err();
        assert!(matches!(err, Error::NegativeVolume(_)));

        // same session, still accumulating from the first candle
        let v = vwap
            .update(&candle("2025-01-01T00:01:00Z", 20.0, 20.0, 20.0, 1.0))
            .unwrap();
        assert_eq!(v, Some(15.0));
    }
}
