use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn};

use common::{CandleClose, Client, Event, EventHandler, MarketData, Result};

use crate::context::StrategyContext;
use crate::warmup;

/// Default snapshot polling interval when the client has no streamer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// User-defined trading logic.
///
/// Implementations own a [`StrategyContext`] and override the callbacks they
/// need. `on_candle_close` stores the candle in chart history by default;
/// overrides that still want that behaviour call
/// [`StrategyContext::record_candle`] themselves.
#[async_trait]
pub trait Strategy: Send {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    fn context(&self) -> &StrategyContext;

    fn context_mut(&mut self) -> &mut StrategyContext;

    fn warmup_enabled(&self) -> bool {
        true
    }

    /// Prime charts and indicators from provider history.
    async fn warmup(&mut self, client: &dyn Client) -> Result<()> {
        if !self.warmup_enabled() {
            return Ok(());
        }
        warmup::warmup_from_provider(self.context_mut(), client).await
    }

    async fn on_price_update(&mut self, _market_data: MarketData) -> Result<()> {
        Ok(())
    }

    async fn on_candle_close(&mut self, candle_close: CandleClose) -> Result<()> {
        self.context_mut().record_candle(&candle_close);
        Ok(())
    }
}

#[async_trait]
impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn context(&self) -> &StrategyContext {
        (**self).context()
    }

    fn context_mut(&mut self) -> &mut StrategyContext {
        (**self).context_mut()
    }

    fn warmup_enabled(&self) -> bool {
        (**self).warmup_enabled()
    }

    async fn warmup(&mut self, client: &dyn Client) -> Result<()> {
        (**self).warmup(client).await
    }

    async fn on_price_update(&mut self, market_data: MarketData) -> Result<()> {
        (**self).on_price_update(market_data).await
    }

    async fn on_candle_close(&mut self, candle_close: CandleClose) -> Result<()> {
        (**self).on_candle_close(candle_close).await
    }
}

/// Routes provider events into a [`Strategy`] and drives its lifecycle.
pub struct Dispatcher<S> {
    strategy: S,
    poll_interval: Duration,
}

impl<S: Strategy> Dispatcher<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut S {
        &mut self.strategy
    }

    pub fn into_inner(self) -> S {
        self.strategy
    }

    /// Warm up, then stream events from `client` (or poll snapshots when the
    /// client cannot stream) until the source is exhausted.
    ///
    /// Warm-up failures are logged and never stop the strategy.
    pub async fn run(&mut self, client: &dyn Client) -> Result<()> {
        let items: Vec<String> = self
            .strategy
            .context()
            .subscriptions()
            .iter()
            .map(|s| s.item_name())
            .collect();
        info!(strategy = %self.strategy.name(), subscriptions = %items.join(", "), "Strategy started");

        if let Err(e) = self.strategy.warmup(client).await {
            error!(strategy = %self.strategy.name(), error = %e, "Warm-up failed; continuing without warm-up");
        }

        match client.streamer() {
            Some(mut streamer) => streamer.run(self).await,
            None => {
                info!("Falling back to polling mode (no streamer available)");
                self.run_polling(client).await
            }
        }
    }

    /// Poll market snapshots for every market subscription, delivering a
    /// tick only when the mid price moves. Chart subscriptions are not polled.
    async fn run_polling(&mut self, client: &dyn Client) -> Result<()> {
        let epics = self.strategy.context().market_epics();
        if epics.is_empty() {
            warn!(strategy = %self.strategy.name(), "No market subscriptions to poll");
            return Ok(());
        }

        let mut last_mid: HashMap<String, f64> = HashMap::new();
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            ticker.tick().await;
            for epic in &epics {
                let snapshot = match client.market_snapshot(epic).await {
                    Ok(s) => s,
                    Err(e) => {
                        error!(epic = %epic, error = %e, "Failed to fetch market snapshot");
                        continue;
                    }
                };

                let mid = snapshot.mid();
                if last_mid.get(epic) == Some(&mid) {
                    continue;
                }
                last_mid.insert(epic.clone(), mid);

                let tick = MarketData {
                    epic: epic.clone(),
                    bid: snapshot.bid,
                    offer: snapshot.offer,
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    raw: serde_json::json!({
                        "snapshot": { "bid": snapshot.bid, "offer": snapshot.offer }
                    }),
                };
                self.handle_event(Event::Price(tick)).await?;
            }
        }
    }
}

#[async_trait]
impl<S: Strategy> EventHandler for Dispatcher<S> {
    async fn handle_event(&mut self, event: Event) -> Result<()> {
        self.strategy.context_mut().touch();
        match event {
            Event::Price(md) => self.strategy.on_price_update(md).await,
            Event::CandleClose(cc) => self.strategy.on_candle_close(cc).await,
        }
    }
}
