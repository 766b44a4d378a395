use serde::{Deserialize, Serialize};

/// A single completed OHLCV bar.
///
/// No ordering between open/high/low/close is enforced; flat candles
/// (high == low == close) are legal and indicators must accept them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// ISO-8601 timestamp. Treated as an opaque, sortable string by indicators.
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume, or 0 when the broker does not report it.
    #[serde(default)]
    pub volume: f64,
    /// Number of price updates inside the bar (volume proxy for FX/CFDs).
    #[serde(default)]
    pub tick_count: u64,
}

impl Candle {
    pub fn new(timestamp: impl Into<String>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            open,
            high,
            low,
            close,
            volume: 0.0,
            tick_count: 0,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_tick_count(mut self, tick_count: u64) -> Self {
        self.tick_count = tick_count;
        self
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

impl std::fmt::Display for Candle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Candle({} O={:.5} H={:.5} L={:.5} C={:.5} V={:.0})",
            self.timestamp, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

/// Tick-level price update for a market subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub epic: String,
    pub bid: f64,
    pub offer: f64,
    pub timestamp: String,
    /// Provider payload the tick was parsed from.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl MarketData {
    pub fn mid(&self) -> f64 {
        (self.bid + self.offer) / 2.0
    }
}

/// Identifies one chart: an instrument at one timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChartKey {
    pub epic: String,
    /// Broker timeframe label, e.g. "1MINUTE", "5MINUTE", "HOUR".
    pub period: String,
}

impl ChartKey {
    pub fn new(epic: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            epic: epic.into(),
            period: period.into(),
        }
    }
}

impl std::fmt::Display for ChartKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.epic, self.period)
    }
}

/// A completed candle for a subscribed chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleClose {
    pub epic: String,
    pub period: String,
    pub candle: Candle,
}

impl CandleClose {
    pub fn new(key: &ChartKey, candle: Candle) -> Self {
        Self {
            epic: key.epic.clone(),
            period: key.period.clone(),
            candle,
        }
    }

    pub fn key(&self) -> ChartKey {
        ChartKey::new(self.epic.clone(), self.period.clone())
    }
}

/// A data stream a strategy wants delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Subscription {
    /// Live bid/offer ticks. Routed to `on_price_update`.
    Market { epic: String },
    /// Completed OHLCV candles. Routed to `on_candle_close`.
    Chart { epic: String, period: String },
}

impl Subscription {
    pub fn market(epic: impl Into<String>) -> Self {
        Subscription::Market { epic: epic.into() }
    }

    pub fn chart(epic: impl Into<String>, period: impl Into<String>) -> Self {
        Subscription::Chart {
            epic: epic.into(),
            period: period.into(),
        }
    }

    pub fn epic(&self) -> &str {
        match self {
            Subscription::Market { epic } | Subscription::Chart { epic, .. } => epic,
        }
    }

    /// Streaming item name, e.g. `MARKET:CS.D.GBPUSD.TODAY.IP` or `CHART:<epic>:5MINUTE`.
    pub fn item_name(&self) -> String {
        match self {
            Subscription::Market { epic } => format!("MARKET:{epic}"),
            Subscription::Chart { epic, period } => format!("CHART:{epic}:{period}"),
        }
    }

    /// `Some` for chart subscriptions only.
    pub fn chart_key(&self) -> Option<ChartKey> {
        match self {
            Subscription::Chart { epic, period } => Some(ChartKey::new(epic.clone(), period.clone())),
            Subscription::Market { .. } => None,
        }
    }
}

/// Everything a provider stream can deliver to a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Price(MarketData),
    CandleClose(CandleClose),
}

impl Event {
    pub fn epic(&self) -> &str {
        match self {
            Event::Price(md) => &md.epic,
            Event::CandleClose(cc) => &cc.epic,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Event::Price(md) => &md.timestamp,
            Event::CandleClose(cc) => &cc.candle.timestamp,
        }
    }
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            other => Err(crate::Error::Order(format!(
                "direction must be BUY or SELL, got '{other}'"
            ))),
        }
    }
}

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl From<Direction> for PositionSide {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Buy => PositionSide::Long,
            Direction::Sell => PositionSide::Short,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// A filled market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub epic: String,
    pub direction: Direction,
    pub size: f64,
    pub price: f64,
    pub timestamp: Option<String>,
}

/// A netted open position on one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub epic: String,
    pub side: PositionSide,
    pub size: f64,
    pub entry_price: f64,
}

/// Broker acknowledgement of a market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealConfirmation {
    pub deal_reference: String,
    pub epic: String,
    pub direction: Direction,
    pub size: f64,
    pub price: f64,
    pub currency: String,
}

/// Current bid/offer for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub bid: f64,
    pub offer: f64,
}

impl MarketSnapshot {
    pub fn mid(&self) -> f64 {
        (self.bid + self.offer) / 2.0
    }
}

/// Broker environment the credentials belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    #[default]
    Demo,
    Live,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Demo => write!(f, "DEMO"),
            Environment::Live => write!(f, "LIVE"),
        }
    }
}
