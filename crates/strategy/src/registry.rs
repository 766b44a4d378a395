use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{info, warn};

use common::{CandleClose, ChartKey, Client, Direction, Error, Result, Subscription};

use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::context::{IndicatorHandle, StrategyContext};
use crate::dispatch::{Dispatcher, Strategy};
use crate::indicators::{Indicator, Macd, Rsi, WilliamsR};

/// Holds the configured strategy instances, each paired with the client it
/// trades and streams through, and runs them side by side.
pub struct StrategyRegistry {
    entries: Vec<(Box<dyn Strategy>, Arc<dyn Client>)>,
}

impl StrategyRegistry {
    /// Build every strategy in `file_cfg`, failing on the first unknown type
    /// or invalid parameter.
    ///
    /// `client_for` is called once per strategy. Each dispatcher streams from
    /// its own client, so a replaying provider must hand out a fresh client
    /// per call; sharing one would replay its history once per strategy into
    /// a single ledger.
    pub fn from_config<F>(file_cfg: &StrategyFileConfig, mut client_for: F) -> Result<Self>
    where
        F: FnMut(&StrategyConfig) -> Result<Arc<dyn Client>>,
    {
        let entries = file_cfg
            .strategies
            .iter()
            .map(|cfg| {
                let client = client_for(cfg)?;
                Ok((build_strategy(cfg, client.clone())?, client))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn Strategy> + '_ {
        self.entries.iter().map(|(strategy, _)| strategy.as_ref())
    }

    /// Run every strategy concurrently on its own client until all finish.
    ///
    /// Returns the first strategy error; the remaining tasks are aborted.
    pub async fn run(self) -> Result<()> {
        if self.entries.is_empty() {
            warn!("No strategies to run");
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for (strategy, client) in self.entries {
            tasks.spawn(async move {
                let mut dispatcher = Dispatcher::new(strategy);
                dispatcher.run(client.as_ref()).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| Error::Provider(format!("strategy task failed: {e}")))?;
            if let Err(e) = outcome {
                tasks.abort_all();
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Construct one built-in strategy from its config entry.
pub fn build_strategy(cfg: &StrategyConfig, client: Arc<dyn Client>) -> Result<Box<dyn Strategy>> {
    let strategy: Box<dyn Strategy> = match cfg.strategy_type.as_str() {
        "williams_r" => {
            let period = cfg.param_usize("period", 14);
            let oversold = cfg.param_f64("oversold", -80.0);
            let overbought = cfg.param_f64("overbought", -20.0);
            Box::new(MeanReversion::new(
                cfg,
                client,
                WilliamsR::new(period)?,
                oversold,
                overbought,
            ))
        }
        "rsi" => {
            let period = cfg.param_usize("period", 14);
            let oversold = cfg.param_f64("oversold", 30.0);
            let overbought = cfg.param_f64("overbought", 70.0);
            Box::new(MeanReversion::new(
                cfg,
                client,
                Rsi::new(period)?,
                oversold,
                overbought,
            ))
        }
        "macd" => {
            let fast = cfg.param_usize("fast", 12);
            let slow = cfg.param_usize("slow", 26);
            let signal = cfg.param_usize("signal", 9);
            Box::new(MacdCrossover::new(cfg, client, Macd::new(fast, slow, signal)?))
        }
        "monitor" => Box::new(Monitor::new(cfg)?),
        other => {
            return Err(Error::Config(format!(
                "Unknown strategy type '{other}' for '{}'",
                cfg.name
            )))
        }
    };

    if cfg.strategy_type != "monitor" && !cfg.indicators.is_empty() {
        warn!(name = %cfg.name, "Extra indicators are only driven by 'monitor' strategies");
    }
    info!(name = %cfg.name, kind = %cfg.strategy_type, chart = %cfg.chart_key(), "Registered strategy");
    Ok(strategy)
}

fn context_for(cfg: &StrategyConfig) -> StrategyContext {
    let mut subscriptions = Vec::with_capacity(2);
    if cfg.subscribe_market {
        subscriptions.push(Subscription::market(cfg.epic.clone()));
    }
    subscriptions.push(Subscription::chart(cfg.epic.clone(), cfg.period.clone()));
    StrategyContext::with_chart_history(subscriptions, cfg.chart_history)
}

// ─── Order bookkeeping ────────────────────────────────────────────────────────

/// Long-only position tracking over a provider client.
struct Trader {
    client: Arc<dyn Client>,
    epic: String,
    size: f64,
    long: bool,
}

impl Trader {
    fn new(cfg: &StrategyConfig, client: Arc<dyn Client>) -> Self {
        Self {
            client,
            epic: cfg.epic.clone(),
            size: cfg.size,
            long: false,
        }
    }

    /// A rejected order is logged and leaves the position unchanged.
    async fn submit(&mut self, name: &str, direction: Direction) {
        match self
            .client
            .place_market_order(&self.epic, direction, self.size)
            .await
        {
            Ok(deal) => {
                self.long = direction == Direction::Buy;
                info!(
                    strategy = %name,
                    epic = %deal.epic,
                    direction = %deal.direction,
                    size = deal.size,
                    price = deal.price,
                    deal_reference = %deal.deal_reference,
                    "Order filled"
                );
            }
            Err(e) => warn!(strategy = %name, epic = %self.epic, error = %e, "Order rejected"),
        }
    }

    async fn enter(&mut self, name: &str) {
        if !self.long {
            self.submit(name, Direction::Buy).await;
        }
    }

    async fn exit(&mut self, name: &str) {
        if self.long {
            self.submit(name, Direction::Sell).await;
        }
    }
}

// ─── Concrete strategy types ──────────────────────────────────────────────────

/// Buys when an oscillator drops to `oversold`, sells when it reaches
/// `overbought`. Used for Williams %R and RSI.
struct MeanReversion<I: Indicator<Output = Option<f64>>> {
    name: String,
    warmup: bool,
    ctx: StrategyContext,
    chart: ChartKey,
    oscillator: IndicatorHandle<I>,
    oversold: f64,
    overbought: f64,
    trader: Trader,
}

impl<I: Indicator<Output = Option<f64>>> MeanReversion<I> {
    fn new(
        cfg: &StrategyConfig,
        client: Arc<dyn Client>,
        indicator: I,
        oversold: f64,
        overbought: f64,
    ) -> Self {
        let chart = cfg.chart_key();
        let mut ctx = context_for(cfg);
        let oscillator = ctx.register_indicator(&chart, indicator);
        Self {
            name: cfg.name.clone(),
            warmup: cfg.warmup,
            ctx,
            chart,
            oscillator,
            oversold,
            overbought,
            trader: Trader::new(cfg, client),
        }
    }
}

#[async_trait]
impl<I: Indicator<Output = Option<f64>>> Strategy for MeanReversion<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn context(&self) -> &StrategyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut StrategyContext {
        &mut self.ctx
    }

    fn warmup_enabled(&self) -> bool {
        self.warmup
    }

    async fn on_candle_close(&mut self, candle_close: CandleClose) -> Result<()> {
        if candle_close.key() != self.chart {
            return Ok(());
        }
        self.ctx.record_candle(&candle_close);

        let Some(indicator) = self.ctx.indicator_mut(&self.oscillator) else {
            return Ok(());
        };
        let Some(value) = indicator.update(&candle_close.candle)? else {
            return Ok(());
        };

        if value <= self.oversold {
            self.trader.enter(&self.name).await;
        } else if value >= self.overbought {
            self.trader.exit(&self.name).await;
        }
        Ok(())
    }
}

/// Buys when the MACD histogram turns positive, sells when it turns negative.
struct MacdCrossover {
    name: String,
    warmup: bool,
    ctx: StrategyContext,
    chart: ChartKey,
    macd: IndicatorHandle<Macd>,
    prev_histogram: Option<f64>,
    trader: Trader,
}

impl MacdCrossover {
    fn new(cfg: &StrategyConfig, client: Arc<dyn Client>, macd: Macd) -> Self {
        let chart = cfg.chart_key();
        let mut ctx = context_for(cfg);
        let macd = ctx.register_indicator(&chart, macd);
        Self {
            name: cfg.name.clone(),
            warmup: cfg.warmup,
            ctx,
            chart,
            macd,
            prev_histogram: None,
            trader: Trader::new(cfg, client),
        }
    }
}

#[async_trait]
impl Strategy for MacdCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn context(&self) -> &StrategyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut StrategyContext {
        &mut self.ctx
    }

    fn warmup_enabled(&self) -> bool {
        self.warmup
    }

    async fn on_candle_close(&mut self, candle_close: CandleClose) -> Result<()> {
        if candle_close.key() != self.chart {
            return Ok(());
        }
        self.ctx.record_candle(&candle_close);

        let Some(macd) = self.ctx.indicator_mut(&self.macd) else {
            return Ok(());
        };
        let Some(histogram) = macd.update(&candle_close.candle)?.histogram else {
            return Ok(());
        };

        match self.prev_histogram.replace(histogram) {
            Some(prev) if prev <= 0.0 && histogram > 0.0 => self.trader.enter(&self.name).await,
            Some(prev) if prev >= 0.0 && histogram < 0.0 => self.trader.exit(&self.name).await,
            _ => {}
        }
        Ok(())
    }
}

/// Drives the configured indicators and logs their readings; never trades.
struct Monitor {
    name: String,
    warmup: bool,
    ctx: StrategyContext,
    chart: ChartKey,
}

impl Monitor {
    fn new(cfg: &StrategyConfig) -> Result<Self> {
        let chart = cfg.chart_key();
        let mut ctx = context_for(cfg);
        for indicator in &cfg.indicators {
            indicator.register(&mut ctx, &chart)?;
        }
        Ok(Self {
            name: cfg.name.clone(),
            warmup: cfg.warmup,
            ctx,
            chart,
        })
    }
}

#[async_trait]
impl Strategy for Monitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn context(&self) -> &StrategyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut StrategyContext {
        &mut self.ctx
    }

    fn warmup_enabled(&self) -> bool {
        self.warmup
    }

    async fn on_candle_close(&mut self, candle_close: CandleClose) -> Result<()> {
        if candle_close.key() != self.chart {
            return Ok(());
        }
        self.ctx.record_candle(&candle_close);
        for (indicator, reading) in self.ctx.update_indicators(&self.chart, &candle_close.candle)? {
            info!(
                strategy = %self.name,
                chart = %self.chart,
                timestamp = %candle_close.candle.timestamp,
                indicator = %indicator,
                reading = %reading,
                "Indicator update"
            );
        }
        Ok(())
    }
}
