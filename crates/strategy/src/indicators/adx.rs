use common::{Candle, Result};

use super::atr::true_range;
use super::{require_period, Indicator, Reading};

/// Average Directional Index with Wilder smoothing.
///
/// TR and ±DM are summed over the first `period` candle-to-candle deltas and
/// then smoothed as `v - v / period + current`. ADX is seeded with the mean
/// of the first `period` DX values, then `(adx * (period - 1) + dx) / period`.
///
/// `plus_di` / `minus_di` are published as soon as the TR/DM seed completes;
/// `ready()` tracks ADX only.
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    seed_tr: f64,
    seed_pdm: f64,
    seed_mdm: f64,
    deltas: usize,
    smoothed: Option<(f64, f64, f64)>,
    dx_seed: f64,
    dx_count: usize,
    adx: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdxReading {
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
}

impl Reading for AdxReading {
    fn is_complete(&self) -> bool {
        self.adx.is_some() && self.plus_di.is_some() && self.minus_di.is_some()
    }
}

impl Adx {
    pub fn new(period: usize) -> Result<Self> {
        let period = require_period("period", period)?;
        Ok(Self {
            period,
            prev: None,
            seed_tr: 0.0,
            seed_pdm: 0.0,
            seed_mdm: 0.0,
            deltas: 0,
            smoothed: None,
            dx_seed: 0.0,
            dx_count: 0,
            adx: None,
        })
    }

    fn directional_index(tr: f64, pdm: f64, mdm: f64) -> (f64, f64) {
        if tr == 0.0 {
            return (0.0, 0.0);
        }
        (100.0 * pdm / tr, 100.0 * mdm / tr)
    }

    fn dx(plus_di: f64, minus_di: f64) -> f64 {
        let denom = plus_di + minus_di;
        if denom == 0.0 {
            return 0.0;
        }
        100.0 * (plus_di - minus_di).abs() / denom
    }

    fn fold_dx(&mut self, dx: f64) -> Option<f64> {
        let p = self.period as f64;
        self.adx = match self.adx {
            Some(prev) => Some((prev * (p - 1.0) + dx) / p),
            None => {
                self.dx_seed += dx;
                self.dx_count += 1;
                (self.dx_count >= self.period).then(|| self.dx_seed / p)
            }
        };
        self.adx
    }
}

impl Indicator for Adx {
    type Output = AdxReading;

    fn update(&mut self, candle: &Candle) -> Result<AdxReading> {
        let Some((prev_high, prev_low, prev_close)) =
            self.prev.replace((candle.high, candle.low, candle.close))
        else {
            return Ok(AdxReading::default());
        };

        let tr = true_range(candle, Some(prev_close));
        let up_move = candle.high - prev_high;
        let down_move = prev_low - candle.low;
        let pdm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let mdm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        self.deltas += 1;
        let p = self.period as f64;
        let (tr_s, pdm_s, mdm_s) = match self.smoothed {
            Some((t, pd, md)) => (t - t / p + tr, pd - pd / p + pdm, md - md / p + mdm),
            None => {
                self.seed_tr += tr;
                self.seed_pdm += pdm;
                self.seed_mdm += mdm;
                if self.deltas < self.period {
                    return Ok(AdxReading::default());
                }
                (self.seed_tr, self.seed_pdm, self.seed_mdm)
            }
        };
        self.smoothed = Some((tr_s, pdm_s, mdm_s));

        let (plus_di, minus_di) = Self::directional_index(tr_s, pdm_s, mdm_s);
        let adx = self.fold_dx(Self::dx(plus_di, minus_di));

        Ok(AdxReading {
            adx,
            plus_di: Some(plus_di),
            minus_di: Some(minus_di),
        })
    }

    fn ready(&self) -> bool {
        self.adx.is_some()
    }

    fn reset(&mut self) {
        *self = Self {
            period: self.period,
            prev: None,
            seed_tr: 0.0,
            seed_pdm: 0.0,
            seed_mdm: 0.0,
            deltas: 0,
            smoothed: None,
            dx_seed: 0.0,
            dx_count: 0,
            adx: None,
        };
    }

    /// `period` deltas seed TR/DM, then `period` DX values seed ADX.
    fn warmup_periods(&self) -> usize {
        2 * self.period
    }

    fn name(&self) -> String {
        format!("ADX({})", self.period)
    }
}
