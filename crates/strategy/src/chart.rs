use std::collections::VecDeque;
use std::fmt;

use common::{Candle, ChartKey};

pub const DEFAULT_CHART_HISTORY: usize = 200;

/// Rolling window of completed candles for one (epic, period) chart.
///
/// Insertion order is preserved and the oldest candle is dropped once
/// `max_length` is reached. The column accessors return values oldest
/// first, optionally limited to the most recent `count` candles.
#[derive(Debug, Clone)]
pub struct ChartHistory {
    key: ChartKey,
    max_length: usize,
    candles: VecDeque<Candle>,
}

impl ChartHistory {
    pub fn new(key: ChartKey, max_length: usize) -> Self {
        Self {
            key,
            max_length,
            candles: VecDeque::with_capacity(max_length),
        }
    }

    pub fn key(&self) -> &ChartKey {
        &self.key
    }

    pub fn epic(&self) -> &str {
        &self.key.epic
    }

    pub fn period(&self) -> &str {
        &self.key.period
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn add_candle(&mut self, candle: Candle) {
        if self.max_length == 0 {
            return;
        }
        if self.candles.len() == self.max_length {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
    }

    /// The last `count` candles (all of them for `None`), oldest first.
    pub fn candles(&self, count: Option<usize>) -> impl Iterator<Item = &Candle> + '_ {
        let n = count.map_or(self.candles.len(), |c| c.min(self.candles.len()));
        self.candles.iter().skip(self.candles.len() - n)
    }

    fn column(&self, count: Option<usize>, f: impl Fn(&Candle) -> f64) -> Vec<f64> {
        self.candles(count).map(f).collect()
    }

    pub fn opens(&self, count: Option<usize>) -> Vec<f64> {
        self.column(count, |c| c.open)
    }

    pub fn highs(&self, count: Option<usize>) -> Vec<f64> {
        self.column(count, |c| c.high)
    }

    pub fn lows(&self, count: Option<usize>) -> Vec<f64> {
        self.column(count, |c| c.low)
    }

    pub fn closes(&self, count: Option<usize>) -> Vec<f64> {
        self.column(count, |c| c.close)
    }

    pub fn volumes(&self, count: Option<usize>) -> Vec<f64> {
        self.column(count, |c| c.volume)
    }

    pub fn typical_prices(&self, count: Option<usize>) -> Vec<f64> {
        self.column(count, Candle::typical_price)
    }

    pub fn tick_counts(&self, count: Option<usize>) -> Vec<u64> {
        self.candles(count).map(|c| c.tick_count).collect()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

impl fmt::Display for ChartHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChartHistory({}, {}/{} candles)",
            self.key,
            self.candles.len(),
            self.max_length
        )
    }
}
