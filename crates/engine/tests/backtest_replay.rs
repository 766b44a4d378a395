use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Candle, ChartKey, Client, Direction, MarketData, PositionSide, Result, Subscription};
use engine::BacktestClient;
use strategy::{
    build_strategy, Dispatcher, Strategy, StrategyContext, StrategyFileConfig, StrategyRegistry,
};

const EPIC: &str = "CS.D.GBPUSD.TODAY.IP";

fn candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Candle::new(format!("2025-01-01T00:{i:02}:00Z"), c, c + 0.5, c - 0.5, c)
        })
        .collect()
}

fn williams_config(warmup: bool) -> StrategyFileConfig {
    StrategyFileConfig::parse(&format!(
        r#"
[[strategy]]
type = "williams_r"
name = "wr-replay"
epic = "{EPIC}"
period = "1MINUTE"
size = 1.0
warmup = {warmup}

[strategy.params]
period = 3
oversold = -80.0
overbought = -20.0
"#
    ))
    .unwrap()
}

fn client_for(closes: &[f64]) -> Arc<BacktestClient> {
    let mut history = BTreeMap::new();
    history.insert(ChartKey::new(EPIC, "1MINUTE"), candles(closes));
    Arc::new(BacktestClient::from_history(history))
}

#[tokio::test]
async fn williams_r_round_trip_realises_profit() {
    let client = client_for(&[10.0, 9.0, 8.0, 9.0, 10.0, 11.0]);
    client.start().await.unwrap();

    let cfg = williams_config(false);
    let strategy = build_strategy(&cfg.strategies[0], client.clone()).unwrap();
    let mut dispatcher = Dispatcher::new(strategy);
    dispatcher.run(client.as_ref()).await.unwrap();
    client.close().await.unwrap();

    // %R hits -83.3 on the third close (buy at 8) and -16.7 on the fifth (sell at 10)
    let trades = client.trades().await;
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].direction, Direction::Buy);
    assert_eq!(trades[0].price, 8.0);
    assert_eq!(trades[0].timestamp.as_deref(), Some("2025-01-01T00:02:00Z"));
    assert_eq!(trades[1].direction, Direction::Sell);
    assert_eq!(trades[1].price, 10.0);

    let report = client.report().await.unwrap();
    assert_eq!(report.trades, 2);
    assert_eq!(report.realised_pnl, 2.0);
    assert_eq!(report.equity, 2.0);
    assert_eq!(report.max_drawdown, 0.0);
    assert!(report.open_positions.is_empty());
    assert!(client.is_closed().await);

    let chart = dispatcher
        .strategy()
        .context()
        .chart(&ChartKey::new(EPIC, "1MINUTE"))
        .unwrap();
    assert_eq!(chart.len(), 6);
}

#[tokio::test]
async fn open_position_is_marked_at_the_last_close() {
    let client = client_for(&[10.0, 9.0, 8.0, 7.5]);
    client.start().await.unwrap();

    let cfg = williams_config(false);
    let strategy = build_strategy(&cfg.strategies[0], client.clone()).unwrap();
    Dispatcher::new(strategy).run(client.as_ref()).await.unwrap();

    let report = client.report().await.unwrap();
    assert_eq!(report.trades, 1);
    assert_eq!(report.open_positions.len(), 1);
    assert_eq!(report.open_positions[0].side, PositionSide::Long);
    assert_eq!(report.unrealised_pnl, -0.5);
    assert_eq!(report.max_drawdown, 0.5);
}

#[tokio::test]
async fn orders_before_start_are_rejected_without_failing_the_run() {
    let client = client_for(&[10.0, 9.0, 8.0]);

    let cfg = williams_config(false);
    let strategy = build_strategy(&cfg.strategies[0], client.clone()).unwrap();
    Dispatcher::new(strategy).run(client.as_ref()).await.unwrap();

    assert!(client.trades().await.is_empty());
}

fn twenty_closes() -> Vec<f64> {
    (0..20)
        .map(|i| 100.0 + if i % 6 < 3 { -(i as f64) } else { i as f64 })
        .collect()
}

#[tokio::test]
async fn registry_replays_each_strategy_on_its_own_client() {
    let closes = twenty_closes();
    let cfg = StrategyFileConfig::parse(&format!(
        r#"
[[strategy]]
type = "williams_r"
name = "wr"
epic = "{EPIC}"
period = "1MINUTE"
size = 1.0
warmup = false

[strategy.params]
period = 3

[[strategy]]
type = "rsi"
name = "rsi"
epic = "{EPIC}"
period = "1MINUTE"
size = 1.0
warmup = false

[strategy.params]
period = 2
"#
    ))
    .unwrap();

    let mut clients = Vec::new();
    let registry = StrategyRegistry::from_config(&cfg, |_| {
        let client = client_for(&closes);
        clients.push(client.clone());
        Ok(client as Arc<dyn Client>)
    })
    .unwrap();
    for client in &clients {
        client.start().await.unwrap();
    }
    registry.run().await.unwrap();

    assert_eq!(clients.len(), 2);
    for client in &clients {
        // one equity sample per replayed candle
        assert_eq!(client.equity_curve().await.len(), closes.len());
    }

    // the %R account matches a run of that strategy alone
    let solo = client_for(&closes);
    solo.start().await.unwrap();
    let strategy = build_strategy(&cfg.strategies[0], solo.clone()).unwrap();
    Dispatcher::new(strategy).run(solo.as_ref()).await.unwrap();
    assert_eq!(clients[0].trades().await, solo.trades().await);
    assert_eq!(clients[0].realised_pnl().await, solo.realised_pnl().await);
}

/// Scratch file under the system temp dir, removed on drop.
struct TempCsv(PathBuf);

impl TempCsv {
    fn new(name: &str, contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("tradedesk-{}-{name}.csv", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        Self(path)
    }
}

impl Drop for TempCsv {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[tokio::test]
async fn candle_csv_replays_through_a_strategy() {
    let csv = TempCsv::new(
        "candles",
        "Date,Open,High,Low,Close\n\
         2025-01-01T00:00:00,10,10.5,9.5,10\n\
         2025-01-01T00:01:00,9,9.5,8.5,9\n\
         2025-01-01T00:02:00,8,8.5,7.5,8\n\
         2025-01-01T00:03:00,9,9.5,8.5,9\n\
         2025-01-01T00:04:00,10,10.5,9.5,10\n",
    );
    let client = Arc::new(BacktestClient::from_csv(&csv.0, ChartKey::new(EPIC, "1MINUTE")).unwrap());
    client.start().await.unwrap();

    let cfg = williams_config(false);
    let strategy = build_strategy(&cfg.strategies[0], client.clone()).unwrap();
    Dispatcher::new(strategy).run(client.as_ref()).await.unwrap();

    let trades = client.trades().await;
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].timestamp.as_deref(), Some("2025-01-01T00:02:00Z"));
    assert_eq!(client.realised_pnl().await, 2.0);
}

/// Market-only strategy on `EPIC`: buys on its first tick, sells once the
/// mid has risen by more than 0.75. Records every mid it is handed.
struct TickTrader {
    ctx: StrategyContext,
    client: Arc<dyn Client>,
    mids: Vec<f64>,
    entry: Option<f64>,
    traded: bool,
}

#[async_trait]
impl Strategy for TickTrader {
    fn name(&self) -> &str {
        "tick trader"
    }

    fn context(&self) -> &StrategyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut StrategyContext {
        &mut self.ctx
    }

    async fn on_price_update(&mut self, market_data: MarketData) -> Result<()> {
        let mid = market_data.mid();
        self.mids.push(mid);
        if market_data.epic != EPIC {
            return Ok(());
        }
        match self.entry {
            None if !self.traded => {
                self.client.place_market_order(EPIC, Direction::Buy, 2.0).await?;
                self.entry = Some(mid);
                self.traded = true;
            }
            Some(entry) if mid > entry + 0.75 => {
                self.client.place_market_order(EPIC, Direction::Sell, 2.0).await?;
                self.entry = None;
            }
            _ => {}
        }
        Ok(())
    }
}

#[tokio::test]
async fn tick_csvs_replay_in_time_order_across_epics() {
    let gbp = TempCsv::new(
        "gbp-ticks",
        "timestamp,bid,offer\n\
         2025-01-01T00:00:00Z,1.0,1.2\n\
         2025-01-01T00:00:02Z,1.5,1.7\n\
         2025-01-01T00:00:04Z,2.0,2.2\n",
    );
    let eur = TempCsv::new(
        "eur-ticks",
        "Time,Bid,Offer\n2025-01-01T00:00:01,5.0,5.0\n",
    );
    let client = Arc::new(
        BacktestClient::from_market_csvs(&[(EPIC, &gbp.0), ("CS.D.EURUSD.TODAY.IP", &eur.0)])
            .unwrap(),
    );
    client.start().await.unwrap();

    let trader = TickTrader {
        ctx: StrategyContext::new(vec![Subscription::market(EPIC)]),
        client: client.clone(),
        mids: Vec::new(),
        entry: None,
        traded: false,
    };
    let mut dispatcher = Dispatcher::new(trader);
    dispatcher.run(client.as_ref()).await.unwrap();

    // every tick is dispatched; the EUR tick lands between the first two GBP ticks
    let mids = &dispatcher.strategy().mids;
    assert_eq!(mids.len(), 4);
    assert!((mids[1] - 5.0).abs() < 1e-12);

    let trades = client.trades().await;
    assert_eq!(trades.len(), 2);
    assert!((trades[0].price - 1.1).abs() < 1e-12);
    assert!((trades[1].price - 2.1).abs() < 1e-12);
    assert!((client.realised_pnl().await - 2.0).abs() < 1e-9);
    assert_eq!(client.equity_curve().await.len(), 4);
}
