//! Startup warm-up: plan, fetch and prime chart history before live dispatch.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use common::{Candle, ChartKey, Client, Error, Result};

use crate::context::StrategyContext;

/// Fetch the history each planned chart needs and prime it into `ctx`.
///
/// Charts are fetched one at a time. A failed fetch leaves that chart cold and
/// moves on to the next; a provider without history support skips warm-up
/// altogether. Errors raised by indicators while priming are returned.
pub async fn warmup_from_provider(ctx: &mut StrategyContext, client: &dyn Client) -> Result<()> {
    let plan = ctx.chart_warmup_plan();
    debug!(?plan, "Warm-up plan");

    if plan.values().all(|&n| n == 0) {
        debug!("No warm-up required (no indicators registered)");
        return Ok(());
    }

    let history = fetch_history(client, &plan).await;
    ctx.warmup_from_history(&history)
}

async fn fetch_history(
    client: &dyn Client,
    plan: &BTreeMap<ChartKey, usize>,
) -> BTreeMap<ChartKey, Vec<Candle>> {
    let mut history = BTreeMap::new();

    for (key, &required) in plan.iter().filter(|(_, &n)| n > 0) {
        match client
            .historical_candles(&key.epic, &key.period, required)
            .await
        {
            Ok(candles) => {
                debug!(
                    epic = %key.epic,
                    period = %key.period,
                    requested = required,
                    candles = candles.len(),
                    "Warm-up fetched candles"
                );
                history.insert(key.clone(), candles);
            }
            Err(Error::Unsupported(what)) => {
                debug!(capability = what, "Client does not support history; skipping warm-up");
                break;
            }
            Err(e) => {
                warn!(
                    epic = %key.epic,
                    period = %key.period,
                    error = %e,
                    "Warm-up fetch failed; continuing without warm-up"
                );
            }
        }
    }

    history
}
