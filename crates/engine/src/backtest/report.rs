use std::fmt;

use serde::Serialize;

use common::Position;

/// Realised plus unrealised PnL after one replayed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: String,
    pub equity: f64,
}

/// End-of-run summary of a backtest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub trades: usize,
    pub realised_pnl: f64,
    pub unrealised_pnl: f64,
    /// `realised_pnl + unrealised_pnl`
    pub equity: f64,
    /// Largest peak-to-trough fall of the equity curve, as a positive amount.
    pub max_drawdown: f64,
    pub open_positions: Vec<Position>,
}

impl BacktestReport {
    pub fn new(
        trades: usize,
        realised_pnl: f64,
        unrealised_pnl: f64,
        open_positions: Vec<Position>,
        equity_curve: &[EquityPoint],
    ) -> Self {
        Self {
            trades,
            realised_pnl,
            unrealised_pnl,
            equity: realised_pnl + unrealised_pnl,
            max_drawdown: max_drawdown(equity_curve),
            open_positions,
        }
    }
}

/// Equity starts at zero, so a curve that only falls still has a peak of 0.
fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    curve
        .iter()
        .fold((0.0_f64, 0.0_f64), |(peak, worst), point| {
            let peak = peak.max(point.equity);
            (peak, worst.max(peak - point.equity))
        })
        .1
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trades={} realised={:.2} unrealised={:.2} equity={:.2} max_drawdown={:.2} open={}",
            self.trades,
            self.realised_pnl,
            self.unrealised_pnl,
            self.equity,
            self.max_drawdown,
            self.open_positions.len()
        )
    }
}
