use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use common::{Candle, CandleClose, ChartKey, Result, Subscription};

use crate::chart::{ChartHistory, DEFAULT_CHART_HISTORY};
use crate::indicators::Indicator;

/// Object-safe view of a registered indicator, used for priming and planning.
trait ChartIndicator: Send {
    /// Advance by one candle and render the reading for logs.
    fn feed(&mut self, candle: &Candle) -> Result<String>;
    fn is_ready(&self) -> bool;
    fn clear(&mut self);
    fn warmup(&self) -> usize;
    fn label(&self) -> String;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Slot<T>(T);

impl<T: Indicator> ChartIndicator for Slot<T> {
    fn feed(&mut self, candle: &Candle) -> Result<String> {
        self.0.update(candle).map(|reading| format!("{reading:?}"))
    }

    fn is_ready(&self) -> bool {
        self.0.ready()
    }

    fn clear(&mut self) {
        self.0.reset()
    }

    fn warmup(&self) -> usize {
        self.0.warmup_periods()
    }

    fn label(&self) -> String {
        self.0.name()
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }
}

/// Typed reference to an indicator owned by a [`StrategyContext`].
pub struct IndicatorHandle<T> {
    key: ChartKey,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> IndicatorHandle<T> {
    pub fn key(&self) -> &ChartKey {
        &self.key
    }
}

impl<T> Clone for IndicatorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            index: self.index,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for IndicatorHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorHandle")
            .field("key", &self.key)
            .field("index", &self.index)
            .finish()
    }
}

/// Per-strategy state shared by every strategy implementation: its
/// subscriptions, one [`ChartHistory`] per chart subscription and the
/// indicators registered against each chart.
pub struct StrategyContext {
    subscriptions: Vec<Subscription>,
    charts: BTreeMap<ChartKey, ChartHistory>,
    indicators: BTreeMap<ChartKey, Vec<Box<dyn ChartIndicator>>>,
    last_update: DateTime<Utc>,
}

impl StrategyContext {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self::with_chart_history(subscriptions, DEFAULT_CHART_HISTORY)
    }

    pub fn with_chart_history(subscriptions: Vec<Subscription>, max_length: usize) -> Self {
        if subscriptions.is_empty() {
            warn!("Strategy has no subscriptions defined");
        }

        let charts = subscriptions
            .iter()
            .filter_map(Subscription::chart_key)
            .map(|key| (key.clone(), ChartHistory::new(key, max_length)))
            .collect();

        Self {
            subscriptions,
            charts,
            indicators: BTreeMap::new(),
            last_update: Utc::now(),
        }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Market subscription epics, in subscription order.
    pub fn market_epics(&self) -> Vec<String> {
        self.subscriptions
            .iter()
            .filter_map(|s| match s {
                Subscription::Market { epic } => Some(epic.clone()),
                Subscription::Chart { .. } => None,
            })
            .collect()
    }

    /// Take ownership of `indicator` and bind it to the chart `key`.
    ///
    /// Registration drives the warm-up plan and priming. Live updates remain
    /// the caller's job, through [`StrategyContext::indicator_mut`].
    pub fn register_indicator<T: Indicator>(
        &mut self,
        key: &ChartKey,
        indicator: T,
    ) -> IndicatorHandle<T> {
        debug!(chart = %key, indicator = %indicator.name(), "Registered indicator");
        let slots = self.indicators.entry(key.clone()).or_default();
        slots.push(Box::new(Slot(indicator)));
        IndicatorHandle {
            key: key.clone(),
            index: slots.len() - 1,
            _marker: PhantomData,
        }
    }

    pub fn indicator<T: Indicator>(&self, handle: &IndicatorHandle<T>) -> Option<&T> {
        self.indicators
            .get(&handle.key)?
            .get(handle.index)?
            .as_any()
            .downcast_ref()
    }

    pub fn indicator_mut<T: Indicator>(&mut self, handle: &IndicatorHandle<T>) -> Option<&mut T> {
        self.indicators
            .get_mut(&handle.key)?
            .get_mut(handle.index)?
            .as_any_mut()
            .downcast_mut()
    }

    /// Names of the indicators registered against `key`, in registration order.
    pub fn indicator_names(&self, key: &ChartKey) -> Vec<String> {
        self.indicators
            .get(key)
            .map(|slots| slots.iter().map(|s| s.label()).collect())
            .unwrap_or_default()
    }

    /// True when every indicator registered against `key` is ready.
    pub fn indicators_ready(&self, key: &ChartKey) -> bool {
        self.indicators
            .get(key)
            .map_or(true, |slots| slots.iter().all(|s| s.is_ready()))
    }

    /// Reset every indicator registered against `key`.
    pub fn reset_indicators(&mut self, key: &ChartKey) {
        if let Some(slots) = self.indicators.get_mut(key) {
            slots.iter_mut().for_each(|s| s.clear());
        }
    }

    pub fn chart(&self, key: &ChartKey) -> Option<&ChartHistory> {
        self.charts.get(key)
    }

    pub fn chart_mut(&mut self, key: &ChartKey) -> Option<&mut ChartHistory> {
        self.charts.get_mut(key)
    }

    /// Completed candles needed to warm every indicator on `key`; 0 when none
    /// are registered.
    pub fn required_warmup(&self, key: &ChartKey) -> usize {
        self.indicators
            .get(key)
            .and_then(|slots| slots.iter().map(|s| s.warmup()).max())
            .unwrap_or(0)
    }

    /// Required warm-up per chart subscription.
    pub fn chart_warmup_plan(&self) -> BTreeMap<ChartKey, usize> {
        self.charts
            .keys()
            .map(|key| (key.clone(), self.required_warmup(key)))
            .collect()
    }

    /// Feed historical candles, oldest first, into the chart and its
    /// indicators. Strategy callbacks are never invoked.
    pub fn prime_chart(&mut self, key: &ChartKey, candles: &[Candle]) -> Result<()> {
        let mut chart = self.charts.get_mut(key);
        let mut slots = self.indicators.get_mut(key);

        for candle in candles {
            if let Some(chart) = chart.as_deref_mut() {
                chart.add_candle(candle.clone());
            }
            if let Some(slots) = slots.as_deref_mut() {
                for slot in slots.iter_mut() {
                    slot.feed(candle)?;
                }
            }
        }
        Ok(())
    }

    /// Prime every planned chart that has an entry in `history`.
    ///
    /// Charts without history are left cold; history for charts that are not
    /// subscribed is ignored.
    pub fn warmup_from_history(&mut self, history: &BTreeMap<ChartKey, Vec<Candle>>) -> Result<()> {
        for key in self.chart_warmup_plan().into_keys() {
            let Some(candles) = history.get(&key).filter(|c| !c.is_empty()) else {
                continue;
            };
            self.prime_chart(&key, candles)?;
            debug!(
                chart = %key,
                candles = candles.len(),
                ready = self.indicators_ready(&key),
                "Primed chart"
            );
        }
        Ok(())
    }

    /// Feed one live candle to every indicator registered against `key` and
    /// return `(name, reading)` pairs in registration order.
    ///
    /// For strategies that drive indicators generically; typed access goes
    /// through [`StrategyContext::indicator_mut`].
    pub fn update_indicators(&mut self, key: &ChartKey, candle: &Candle) -> Result<Vec<(String, String)>> {
        let Some(slots) = self.indicators.get_mut(key) else {
            return Ok(Vec::new());
        };
        slots
            .iter_mut()
            .map(|slot| Ok((slot.label(), slot.feed(candle)?)))
            .collect()
    }

    /// Default candle-close handling: append to the matching chart, if any.
    pub fn record_candle(&mut self, close: &CandleClose) {
        if let Some(chart) = self.charts.get_mut(&close.key()) {
            chart.add_candle(close.candle.clone());
        }
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub(crate) fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}

impl fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indicators: BTreeMap<String, Vec<String>> = self
            .indicators
            .iter()
            .map(|(k, slots)| (k.to_string(), slots.iter().map(|s| s.label()).collect()))
            .collect();
        f.debug_struct("StrategyContext")
            .field("subscriptions", &self.subscriptions)
            .field("charts", &self.charts.keys().collect::<Vec<_>>())
            .field("indicators", &indicators)
            .field("last_update", &self.last_update)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{Macd, Obv, Rsi, Sma, WilliamsR};

    fn key() -> ChartKey {
        ChartKey::new("CS.D.GBPUSD.TODAY.IP", "5MINUTE")
    }

    fn rising(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Candle::new(format!("2025-01-01T00:{i:02}:00Z"), c, c + 1.0, c - 1.0, c)
                    .with_volume(10.0)
            })
            .collect()
    }

    fn ctx() -> StrategyContext {
        StrategyContext::new(vec![
            Subscription::market("CS.D.GBPUSD.TODAY.IP"),
            Subscription::chart("CS.D.GBPUSD.TODAY.IP", "5MINUTE"),
        ])
    }

    #[test]
    fn chart_created_per_chart_subscription() {
        let ctx = ctx();
        assert!(ctx.chart(&key()).is_some());
        assert_eq!(ctx.chart(&key()).map(|c| c.max_length()), Some(200));
        assert_eq!(ctx.market_epics(), vec!["CS.D.GBPUSD.TODAY.IP".to_string()]);
    }

    #[test]
    fn plan_takes_max_warmup_per_chart() {
        let mut ctx = ctx();
        assert_eq!(ctx.chart_warmup_plan().get(&key()), Some(&0));

        ctx.register_indicator(&key(), Sma::new(20).unwrap());
        ctx.register_indicator(&key(), Macd::new(12, 26, 9).unwrap());
        ctx.register_indicator(&key(), Obv::new());
        assert_eq!(ctx.required_warmup(&key()), 34);
        assert_eq!(ctx.chart_warmup_plan().get(&key()), Some(&34));
    }

    #[test]
    fn unsubscribed_registration_is_not_planned() {
        let mut ctx = ctx();
        let other = ChartKey::new("OTHER", "HOUR");
        ctx.register_indicator(&other, Rsi::new(14).unwrap());
        assert_eq!(ctx.required_warmup(&other), 15);
        assert!(!ctx.chart_warmup_plan().contains_key(&other));
    }

    #[test]
    fn handles_give_typed_access() {
        let mut ctx = ctx();
        let sma = ctx.register_indicator(&key(), Sma::new(3).unwrap());
        let wr = ctx.register_indicator(&key(), WilliamsR::new(3).unwrap());

        assert_eq!(ctx.indicator(&sma).map(Sma::period), Some(3));
        let value = ctx
            .indicator_mut(&wr)
            .map(|wr| wr.update(&rising(1)[0]))
            .transpose()
            .unwrap();
        assert_eq!(value, Some(None));
        assert_eq!(ctx.indicator_names(&key()), vec!["SMA(3)", "WilliamsR(3)"]);
    }

    #[test]
    fn priming_with_warmup_candles_readies_every_indicator() {
        let mut ctx = ctx();
        let rsi = ctx.register_indicator(&key(), Rsi::new(5).unwrap());
        let sma = ctx.register_indicator(&key(), Sma::new(3).unwrap());
        let n = ctx.required_warmup(&key());

        ctx.prime_chart(&key(), &rising(n - 1)).unwrap();
        assert!(!ctx.indicators_ready(&key()));

        ctx.reset_indicators(&key());
        ctx.prime_chart(&key(), &rising(n)).unwrap();
        assert!(ctx.indicator(&rsi).is_some_and(Rsi::ready));
        assert!(ctx.indicator(&sma).is_some_and(Sma::ready));
    }

    #[test]
    fn warmup_from_history_skips_missing_and_unknown_charts() {
        let mut ctx = ctx();
        ctx.register_indicator(&key(), Sma::new(3).unwrap());

        let mut history = BTreeMap::new();
        history.insert(ChartKey::new("UNKNOWN", "HOUR"), rising(5));
        ctx.warmup_from_history(&history).unwrap();
        assert_eq!(ctx.chart(&key()).map(ChartHistory::len), Some(0));

        history.insert(key(), rising(3));
        ctx.warmup_from_history(&history).unwrap();
        assert_eq!(ctx.chart(&key()).map(ChartHistory::len), Some(3));
        assert!(ctx.indicators_ready(&key()));
    }

    #[test]
    fn priming_propagates_indicator_errors() {
        let mut ctx = ctx();
        ctx.register_indicator(&key(), Obv::new());
        let bad = vec![Candle::new("t", 1.0, 1.0, 1.0, 1.0).with_volume(-1.0)];
        assert!(ctx.prime_chart(&key(), &bad).is_err());
    }

    #[test]
    fn update_indicators_reports_each_reading() {
        let mut ctx = ctx();
        ctx.register_indicator(&key(), Sma::new(1).unwrap());
        ctx.register_indicator(&key(), Obv::new());
        let readings = ctx.update_indicators(&key(), &rising(1)[0]).unwrap();
        assert_eq!(
            readings,
            vec![
                ("SMA(1)".to_string(), "Some(100.0)".to_string()),
                ("OBV".to_string(), "None".to_string()),
            ]
        );
        assert!(ctx
            .update_indicators(&ChartKey::new("OTHER", "HOUR"), &rising(1)[0])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn record_candle_appends_to_matching_chart_only() {
        let mut ctx = ctx();
        let candle = rising(1).remove(0);
        ctx.record_candle(&CandleClose::new(&key(), candle.clone()));
        ctx.record_candle(&CandleClose::new(&ChartKey::new("OTHER", "HOUR"), candle));
        assert_eq!(ctx.chart(&key()).map(ChartHistory::len), Some(1));
    }
}
