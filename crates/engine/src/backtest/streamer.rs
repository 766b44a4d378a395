use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{CandleClose, Error, Event, EventHandler, Result, Streamer};

use super::client::{CandleSeries, Ledger, MarketSeries};

/// Replays every candle close and tick of a [`super::BacktestClient`] in
/// timestamp order.
///
/// Before each event is handed to the strategy the client's mark price and
/// current timestamp are moved to that event, so orders placed from the
/// callback fill at the replayed price.
pub struct BacktestStreamer {
    candles: Arc<Vec<CandleSeries>>,
    ticks: Arc<Vec<MarketSeries>>,
    ledger: Arc<RwLock<Ledger>>,
    connected: bool,
}

impl BacktestStreamer {
    pub(crate) fn new(
        candles: Arc<Vec<CandleSeries>>,
        ticks: Arc<Vec<MarketSeries>>,
        ledger: Arc<RwLock<Ledger>>,
    ) -> Self {
        Self {
            candles,
            ticks,
            ledger,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// All events merged and stably sorted by parsed timestamp.
    fn timeline(&self) -> Result<Vec<Event>> {
        let mut stream: Vec<(DateTime<Utc>, Event)> = Vec::new();

        for series in self.candles.iter() {
            for candle in &series.candles {
                let ts = parse_timestamp(&candle.timestamp)?;
                stream.push((ts, Event::CandleClose(CandleClose::new(&series.key, candle.clone()))));
            }
        }
        for series in self.ticks.iter() {
            for tick in &series.ticks {
                stream.push((parse_timestamp(&tick.timestamp)?, Event::Price(tick.clone())));
            }
        }

        stream.sort_by_key(|(ts, _)| *ts);
        Ok(stream.into_iter().map(|(_, event)| event).collect())
    }

    async fn replay(&mut self, handler: &mut dyn EventHandler) -> Result<usize> {
        let events = self.timeline()?;
        let total = events.len();

        for event in events {
            {
                let mut ledger = self.ledger.write().await;
                match &event {
                    Event::Price(md) => ledger.set_mark(&md.epic, md.mid()),
                    Event::CandleClose(cc) => ledger.set_mark(&cc.epic, cc.candle.close),
                }
                ledger.set_timestamp(event.timestamp());
            }

            handler.handle_event(event).await?;
            self.ledger.write().await.record_equity()?;
        }
        Ok(total)
    }
}

#[async_trait]
impl Streamer for BacktestStreamer {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    async fn run(&mut self, handler: &mut dyn EventHandler) -> Result<()> {
        self.connect().await?;
        let outcome = self.replay(handler).await;
        self.disconnect().await?;

        let events = outcome?;
        info!(events, "Backtest replay complete");
        Ok(())
    }
}

/// Parse an ISO-8601 timestamp. A trailing `Z` or an explicit offset is
/// honoured; timestamps without one are taken as UTC.
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = ts.strip_suffix('Z').unwrap_or(ts);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(dt.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    debug!(timestamp = %ts, "Unparseable timestamp");
    Err(Error::Timestamp(ts.to_string()))
}
