use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Candle, ChartKey, Client, DealConfirmation, Direction, Error, MarketData, MarketSnapshot,
    Position, PositionSide, Result, Streamer, Trade,
};

use super::loader::{load_candles_csv, load_ticks_csv};
use super::report::{BacktestReport, EquityPoint};
use super::streamer::BacktestStreamer;

/// Completed candles for one chart, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    pub key: ChartKey,
    pub candles: Vec<Candle>,
}

/// Ticks for one instrument, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    pub epic: String,
    pub ticks: Vec<MarketData>,
}

/// Mutable replay state shared between the client and its streamers.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    started: bool,
    closed: bool,
    marks: HashMap<String, f64>,
    current_timestamp: Option<String>,
    trades: Vec<Trade>,
    positions: BTreeMap<String, Position>,
    realised_pnl: f64,
    deals: u64,
    equity_curve: Vec<EquityPoint>,
}

impl Ledger {
    pub(crate) fn set_mark(&mut self, epic: &str, price: f64) {
        self.marks.insert(epic.to_string(), price);
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: &str) {
        self.current_timestamp = Some(timestamp.to_string());
    }

    fn mark(&self, epic: &str) -> Result<f64> {
        self.marks.get(epic).copied().ok_or_else(|| {
            Error::Order(format!(
                "No mark price available for {epic} (no data replayed yet)"
            ))
        })
    }

    fn unrealised_pnl(&self) -> Result<f64> {
        self.positions.values().try_fold(0.0, |acc, pos| {
            let mark = self.mark(&pos.epic)?;
            Ok(acc
                + match pos.side {
                    PositionSide::Long => (mark - pos.entry_price) * pos.size,
                    PositionSide::Short => (pos.entry_price - mark) * pos.size,
                })
        })
    }

    /// Append an equity sample at the current replay time.
    pub(crate) fn record_equity(&mut self) -> Result<()> {
        let equity = self.realised_pnl + self.unrealised_pnl()?;
        if let Some(timestamp) = self.current_timestamp.clone() {
            self.equity_curve.push(EquityPoint { timestamp, equity });
        }
        Ok(())
    }

    /// Fill at the mark price and net against the open position.
    fn fill(&mut self, epic: &str, direction: Direction, size: f64) -> Result<f64> {
        if !self.started {
            return Err(Error::Order("BacktestClient not started".into()));
        }
        if !(size > 0.0) {
            return Err(Error::Order(format!("size must be > 0, got {size}")));
        }
        let price = self.mark(epic)?;

        self.trades.push(Trade {
            epic: epic.to_string(),
            direction,
            size,
            price,
            timestamp: self.current_timestamp.clone(),
        });

        let side = PositionSide::from(direction);
        let Some(pos) = self.positions.get_mut(epic) else {
            self.positions.insert(epic.to_string(), open(epic, side, size, price));
            return Ok(price);
        };

        if pos.side == side {
            let new_size = pos.size + size;
            pos.entry_price = (pos.entry_price * pos.size + price * size) / new_size;
            pos.size = new_size;
            return Ok(price);
        }

        let closed = pos.size.min(size);
        self.realised_pnl += match pos.side {
            PositionSide::Long => (price - pos.entry_price) * closed,
            PositionSide::Short => (pos.entry_price - price) * closed,
        };
        pos.size -= closed;
        if pos.size <= 0.0 {
            self.positions.remove(epic);
        }

        let residual = size - closed;
        if residual > 0.0 {
            self.positions.insert(epic.to_string(), open(epic, side, residual, price));
        }
        Ok(price)
    }
}

fn open(epic: &str, side: PositionSide, size: f64, price: f64) -> Position {
    Position {
        epic: epic.to_string(),
        side,
        size,
        entry_price: price,
    }
}

/// Offline provider: serves history from memory, replays it through a
/// [`BacktestStreamer`] and fills market orders at the latest mark price.
///
/// Opposite-direction orders net against the open position: they reduce or
/// close it, realising PnL, and any excess opens a new position the other way.
pub struct BacktestClient {
    candles: Arc<Vec<CandleSeries>>,
    ticks: Arc<Vec<MarketSeries>>,
    ledger: Arc<RwLock<Ledger>>,
}

impl BacktestClient {
    pub fn new(candles: Vec<CandleSeries>, ticks: Vec<MarketSeries>) -> Self {
        info!(
            charts = candles.len(),
            candles = candles.iter().map(|s| s.candles.len()).sum::<usize>(),
            tick_series = ticks.len(),
            "BacktestClient initialized"
        );
        Self {
            candles: Arc::new(candles),
            ticks: Arc::new(ticks),
            ledger: Arc::new(RwLock::new(Ledger::default())),
        }
    }

    pub fn from_history(history: BTreeMap<ChartKey, Vec<Candle>>) -> Self {
        let series = history
            .into_iter()
            .map(|(key, candles)| CandleSeries { key, candles })
            .collect();
        Self::new(series, Vec::new())
    }

    /// One candle series read from CSV.
    pub fn from_csv(path: impl AsRef<Path>, key: ChartKey) -> Result<Self> {
        let candles = load_candles_csv(path)?;
        Ok(Self::new(vec![CandleSeries { key, candles }], Vec::new()))
    }

    /// Tick-only replay, one CSV per epic.
    pub fn from_market_csvs<P: AsRef<Path>>(files: &[(&str, P)]) -> Result<Self> {
        let ticks = files
            .iter()
            .map(|(epic, path)| {
                Ok(MarketSeries {
                    epic: epic.to_string(),
                    ticks: load_ticks_csv(path, epic)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(Vec::new(), ticks))
    }

    pub async fn mark_price(&self, epic: &str) -> Option<f64> {
        self.ledger.read().await.marks.get(epic).copied()
    }

    /// Override the mark price, e.g. before placing orders outside a replay.
    pub async fn set_mark_price(&self, epic: &str, price: f64) {
        self.ledger.write().await.set_mark(epic, price);
    }

    pub async fn current_timestamp(&self) -> Option<String> {
        self.ledger.read().await.current_timestamp.clone()
    }

    pub async fn trades(&self) -> Vec<Trade> {
        self.ledger.read().await.trades.clone()
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.ledger.read().await.positions.values().cloned().collect()
    }

    pub async fn realised_pnl(&self) -> f64 {
        self.ledger.read().await.realised_pnl
    }

    pub async fn equity_curve(&self) -> Vec<EquityPoint> {
        self.ledger.read().await.equity_curve.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.ledger.read().await.closed
    }

    /// Summary of the replay so far; fails if an open position has no mark.
    pub async fn report(&self) -> Result<BacktestReport> {
        let ledger = self.ledger.read().await;
        let unrealised_pnl = ledger.unrealised_pnl()?;
        Ok(BacktestReport::new(
            ledger.trades.len(),
            ledger.realised_pnl,
            unrealised_pnl,
            ledger.positions.values().cloned().collect(),
            &ledger.equity_curve,
        ))
    }
}

#[async_trait]
impl Client for BacktestClient {
    async fn start(&self) -> Result<()> {
        self.ledger.write().await.started = true;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.ledger.write().await.closed = true;
        Ok(())
    }

    async fn market_snapshot(&self, epic: &str) -> Result<MarketSnapshot> {
        let price = self.ledger.read().await.mark(epic)?;
        Ok(MarketSnapshot {
            bid: price,
            offer: price,
        })
    }

    async fn historical_candles(
        &self,
        epic: &str,
        period: &str,
        num_points: usize,
    ) -> Result<Vec<Candle>> {
        let Some(series) = self
            .candles
            .iter()
            .find(|s| s.key.epic == epic && s.key.period == period)
        else {
            return Ok(Vec::new());
        };
        let skip = series.candles.len().saturating_sub(num_points);
        Ok(series.candles[skip..].to_vec())
    }

    async fn place_market_order(
        &self,
        epic: &str,
        direction: Direction,
        size: f64,
    ) -> Result<DealConfirmation> {
        let mut ledger = self.ledger.write().await;
        let price = ledger.fill(epic, direction, size)?;
        ledger.deals += 1;
        let deal_reference = format!("BACKTEST-{}", ledger.deals);

        debug!(
            epic = %epic,
            direction = %direction,
            size = size,
            price = price,
            realised_pnl = ledger.realised_pnl,
            "Backtest fill"
        );

        Ok(DealConfirmation {
            deal_reference,
            epic: epic.to_string(),
            direction,
            size,
            price,
            currency: "USD".to_string(),
        })
    }

    fn streamer(&self) -> Option<Box<dyn Streamer>> {
        Some(Box::new(BacktestStreamer::new(
            self.candles.clone(),
            self.ticks.clone(),
            self.ledger.clone(),
        )))
    }
}
