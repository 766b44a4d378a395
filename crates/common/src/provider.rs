use async_trait::async_trait;

use crate::{Candle, DealConfirmation, Direction, Error, Event, MarketSnapshot, Result};

/// Abstraction over a broker (or replay) connection.
///
/// A live broker client and `BacktestClient` both implement this. Optional
/// capabilities default to `Error::Unsupported` / `None` so a provider only
/// implements what it actually offers.
#[async_trait]
pub trait Client: Send + Sync {
    /// Initialise the client (create a session, authenticate).
    async fn start(&self) -> Result<()>;

    /// Release any underlying resources.
    async fn close(&self) -> Result<()>;

    /// Latest bid/offer for an instrument.
    async fn market_snapshot(&self, epic: &str) -> Result<MarketSnapshot>;

    /// Up to `num_points` of the most recent completed candles, oldest first.
    ///
    /// Returning fewer candles than requested is legal.
    async fn historical_candles(
        &self,
        _epic: &str,
        _period: &str,
        _num_points: usize,
    ) -> Result<Vec<Candle>> {
        Err(Error::Unsupported("historical candles"))
    }

    /// Submit a market order.
    async fn place_market_order(
        &self,
        epic: &str,
        direction: Direction,
        size: f64,
    ) -> Result<DealConfirmation>;

    /// A stream of events for this client, if the provider supports streaming.
    fn streamer(&self) -> Option<Box<dyn Streamer>> {
        None
    }
}

/// Receives events from a [`Streamer`], one at a time.
#[async_trait]
pub trait EventHandler: Send {
    async fn handle_event(&mut self, event: Event) -> Result<()>;
}

/// A real-time (or replay) market data stream.
#[async_trait]
pub trait Streamer: Send {
    /// Establish the underlying connection.
    async fn connect(&mut self) -> Result<()>;

    /// Tear down the connection and unsubscribe.
    async fn disconnect(&mut self) -> Result<()>;

    /// Deliver events to `handler` until the stream ends.
    async fn run(&mut self, handler: &mut dyn EventHandler) -> Result<()>;
}
