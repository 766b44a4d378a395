use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{ChartKey, Error, Result};

use crate::chart::DEFAULT_CHART_HISTORY;
use crate::context::StrategyContext;
use crate::indicators::{
    Adx, Atr, BollingerBands, Cci, Ema, Macd, Mfi, Obv, Rsi, Sma, Stochastic, Vwap, WilliamsR,
};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "williams_r"
/// name = "GBPUSD %R 14"
/// epic = "CS.D.GBPUSD.TODAY.IP"
/// period = "5MINUTE"
/// size = 1.0
///
/// [strategy.params]
/// period = 14
/// oversold = -80.0
/// overbought = -20.0
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier: "williams_r", "rsi", "macd" or "monitor".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Human-readable name shown in logs.
    pub name: String,
    /// Instrument, e.g. "CS.D.GBPUSD.TODAY.IP".
    pub epic: String,
    /// Chart timeframe, e.g. "5MINUTE".
    pub period: String,
    /// Order size in instrument units.
    pub size: f64,
    #[serde(default = "default_chart_history")]
    pub chart_history: usize,
    #[serde(default = "default_true")]
    pub warmup: bool,
    /// Also deliver market ticks for `epic`.
    #[serde(default)]
    pub subscribe_market: bool,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
    /// Extra indicators registered against the strategy's chart.
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,
}

fn default_chart_history() -> usize {
    DEFAULT_CHART_HISTORY
}

fn default_true() -> bool {
    true
}

impl StrategyConfig {
    pub fn chart_key(&self) -> ChartKey {
        ChartKey::new(self.epic.clone(), self.period.clone())
    }

    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params
            .get(key)
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
            .unwrap_or(default)
    }

    pub fn param_usize(&self, key: &str, default: usize) -> usize {
        self.params
            .get(key)
            .and_then(|v| v.as_integer())
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(default)
    }
}

impl StrategyFileConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read strategy config at '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        for s in &self.strategies {
            if !(s.size > 0.0) {
                return Err(Error::Config(format!(
                    "strategy '{}': size must be > 0, got {}",
                    s.name, s.size
                )));
            }
            if s.epic.trim().is_empty() || s.period.trim().is_empty() {
                return Err(Error::Config(format!(
                    "strategy '{}': epic and period are required",
                    s.name
                )));
            }
        }
        Ok(())
    }
}

/// Declarative indicator, e.g. `{ type = "bollinger", period = 20, k = 2.0 }`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorConfig {
    Sma {
        period: usize,
    },
    Ema {
        period: usize,
    },
    Atr {
        period: usize,
    },
    Rsi {
        period: usize,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        k: f64,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Adx {
        period: usize,
    },
    Vwap {
        #[serde(default = "default_true")]
        use_typical_price: bool,
        #[serde(default = "default_true")]
        reset_daily_utc: bool,
    },
    Obv,
    Cci {
        period: usize,
    },
    Mfi {
        period: usize,
    },
    WilliamsR {
        period: usize,
    },
}

impl IndicatorConfig {
    /// Construct the indicator and register it against `key`.
    pub fn register(&self, ctx: &mut StrategyContext, key: &ChartKey) -> Result<()> {
        match *self {
            IndicatorConfig::Sma { period } => {
                ctx.register_indicator(key, Sma::new(period)?);
            }
            IndicatorConfig::Ema { period } => {
                ctx.register_indicator(key, Ema::new(period)?);
            }
            IndicatorConfig::Atr { period } => {
                ctx.register_indicator(key, Atr::new(period)?);
            }
            IndicatorConfig::Rsi { period } => {
                ctx.register_indicator(key, Rsi::new(period)?);
            }
            IndicatorConfig::Macd { fast, slow, signal } => {
                ctx.register_indicator(key, Macd::new(fast, slow, signal)?);
            }
            IndicatorConfig::Bollinger { period, k } => {
                ctx.register_indicator(key, BollingerBands::new(period, k)?);
            }
            IndicatorConfig::Stochastic { k_period, d_period } => {
                ctx.register_indicator(key, Stochastic::new(k_period, d_period)?);
            }
            IndicatorConfig::Adx { period } => {
                ctx.register_indicator(key, Adx::new(period)?);
            }
            IndicatorConfig::Vwap {
                use_typical_price,
                reset_daily_utc,
            } => {
                ctx.register_indicator(key, Vwap::new(use_typical_price, reset_daily_utc));
            }
            IndicatorConfig::Obv => {
                ctx.register_indicator(key, Obv::new());
            }
            IndicatorConfig::Cci { period } => {
                ctx.register_indicator(key, Cci::new(period)?);
            }
            IndicatorConfig::Mfi { period } => {
                ctx.register_indicator(key, Mfi::new(period)?);
            }
            IndicatorConfig::WilliamsR { period } => {
                ctx.register_indicator(key, WilliamsR::new(period)?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Subscription;

    const SAMPLE: &str = r#"
        [[strategy]]
        type = "williams_r"
        name = "GBPUSD %R"
        epic = "CS.D.GBPUSD.TODAY.IP"
        period = "5MINUTE"
        size = 1.5

        [strategy.params]
        period = 10
        oversold = -85

        [[strategy.indicators]]
        type = "bollinger"
        period = 20
        k = 2.0

        [[strategy.indicators]]
        type = "obv"

        [[strategy]]
        type = "macd"
        name = "FTSE MACD"
        epic = "IX.D.FTSE.DAILY.IP"
        period = "HOUR"
        size = 2.0
        chart_history = 50
        warmup = false
    "#;

    #[test]
    fn parses_strategies_with_defaults() {
        let cfg = StrategyFileConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.strategies.len(), 2);

        let wr = &cfg.strategies[0];
        assert_eq!(wr.chart_history, 200);
        assert!(wr.warmup);
        assert!(!wr.subscribe_market);
        assert_eq!(wr.param_usize("period", 14), 10);
        assert_eq!(wr.param_f64("oversold", -80.0), -85.0);
        assert_eq!(wr.param_f64("overbought", -20.0), -20.0);
        assert_eq!(
            wr.indicators,
            vec![IndicatorConfig::Bollinger { period: 20, k: 2.0 }, IndicatorConfig::Obv]
        );

        let macd = &cfg.strategies[1];
        assert_eq!(macd.chart_history, 50);
        assert!(!macd.warmup);
        assert_eq!(macd.chart_key(), ChartKey::new("IX.D.FTSE.DAILY.IP", "HOUR"));
    }

    #[test]
    fn non_positive_size_is_rejected() {
        let err = StrategyFileConfig::parse(
            r#"
            [[strategy]]
            type = "rsi"
            name = "bad"
            epic = "E"
            period = "HOUR"
            size = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_toml_error() {
        let err = StrategyFileConfig::parse("[[strategy]\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = StrategyFileConfig::load("/nonexistent/strategies.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn indicator_configs_register_with_their_warmups() {
        let key = ChartKey::new("E", "HOUR");
        let mut ctx = StrategyContext::new(vec![Subscription::chart("E", "HOUR")]);
        let all: Vec<IndicatorConfig> = toml::from_str::<HashMap<String, Vec<IndicatorConfig>>>(
            r#"
            i = [
                { type = "sma", period = 3 },
                { type = "ema", period = 3 },
                { type = "atr", period = 3 },
                { type = "rsi", period = 3 },
                { type = "macd", fast = 3, slow = 6, signal = 4 },
                { type = "bollinger", period = 3, k = 2.0 },
                { type = "stochastic", k_period = 3, d_period = 3 },
                { type = "adx", period = 3 },
                { type = "vwap" },
                { type = "obv" },
                { type = "cci", period = 3 },
                { type = "mfi", period = 3 },
                { type = "williams_r", period = 3 },
            ]
            "#,
        )
        .unwrap()
        .remove("i")
        .unwrap();

        for ind in &all {
            ind.register(&mut ctx, &key).unwrap();
        }
        assert_eq!(ctx.indicator_names(&key).len(), 13);
        // MACD(3,6,4) needs 6 + 4 - 1
        assert_eq!(ctx.required_warmup(&key), 9);
    }

    #[test]
    fn invalid_indicator_parameters_surface() {
        let mut ctx = StrategyContext::new(vec![]);
        let err = IndicatorConfig::Bollinger { period: 20, k: 0.0 }
            .register(&mut ctx, &ChartKey::new("E", "HOUR"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "k", .. }));
    }
}
