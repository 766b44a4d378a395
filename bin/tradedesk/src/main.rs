use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{ChartKey, Client, Settings};
use engine::backtest::{load_candles_csv, BacktestClient};
use strategy::{StrategyConfig, StrategyFileConfig, StrategyRegistry};

const USAGE: &str = "usage: tradedesk <candles.csv> <epic> <period>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let settings = Settings::from_env().context("Failed to load settings")?;

    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [csv_path, epic, period] = args.as_slice() else {
        bail!(USAGE);
    };
    let key = ChartKey::new(epic.as_str(), period.as_str());
    info!(environment = %settings.environment, chart = %key, "Tradedesk backtest starting");

    // ── History ──────────────────────────────────────────────────────────────
    let candles = load_candles_csv(csv_path)
        .with_context(|| format!("Failed to load candles from {csv_path}"))?;
    if candles.is_empty() {
        bail!("{csv_path} contains no candles");
    }

    // ── Strategies ───────────────────────────────────────────────────────────
    let strategy_file = StrategyFileConfig::load(&settings.strategy_config_path)
        .with_context(|| format!("Failed to load {}", settings.strategy_config_path))?;
    if strategy_file.strategies.is_empty() {
        warn!(path = %settings.strategy_config_path, "No strategies configured");
        return Ok(());
    }

    // One client per strategy so positions never net across strategies.
    let strategy_file = StrategyFileConfig {
        strategies: strategy_file
            .strategies
            .iter()
            .map(|cfg| for_chart(cfg, &key))
            .collect(),
    };
    let mut clients: Vec<(String, Arc<BacktestClient>)> = Vec::new();
    let registry = StrategyRegistry::from_config(&strategy_file, |cfg| {
        let mut history = BTreeMap::new();
        history.insert(key.clone(), candles.clone());
        let client = Arc::new(BacktestClient::from_history(history));
        clients.push((cfg.name.clone(), client.clone()));
        Ok(client as Arc<dyn Client>)
    })
    .context("Failed to build strategies")?;

    for (_, client) in &clients {
        client.start().await?;
    }

    // ── Replay ───────────────────────────────────────────────────────────────
    tokio::select! {
        outcome = registry.run() => {
            outcome.context("Backtest failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Stopping backtest.");
        }
    }

    // ── Reports ──────────────────────────────────────────────────────────────
    for (name, client) in &clients {
        let report = client.report().await?;
        info!(strategy = %name, %report, "Backtest finished");
        for pos in &report.open_positions {
            info!(
                strategy = %name,
                epic = %pos.epic,
                side = %pos.side,
                size = pos.size,
                entry_price = pos.entry_price,
                "Open position"
            );
        }
        client.close().await?;
    }

    Ok(())
}

/// Point a configured strategy at the replayed chart.
///
/// The replay itself primes indicators from the first candles, so provider
/// warm-up is switched off; it would otherwise read the end of the series.
fn for_chart(cfg: &StrategyConfig, key: &ChartKey) -> StrategyConfig {
    let mut cfg = cfg.clone();
    if cfg.chart_key() != *key {
        info!(strategy = %cfg.name, configured = %cfg.chart_key(), replayed = %key, "Retargeting strategy");
        cfg.epic = key.epic.clone();
        cfg.period = key.period.clone();
    }
    cfg.warmup = false;
    cfg
}
