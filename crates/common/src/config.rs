use crate::{Environment, Error, Result};

/// Broker and process settings, loaded from environment variables.
///
/// Passed explicitly to whatever needs it; there is no global instance.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    // Broker credentials
    pub ig_api_key: String,
    pub ig_username: String,
    pub ig_password: String,
    pub environment: Environment,

    // Logging
    pub log_level: String,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl Settings {
    /// Load settings from the process environment, reading `.env` first if present.
    ///
    /// Missing credentials are left empty; call [`Settings::validate`] before
    /// talking to a live broker.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("IG_ENVIRONMENT")
            .map(|v| v.trim().to_uppercase())
            .as_deref()
        {
            None | Some("") | Some("DEMO") => Environment::Demo,
            Some("LIVE") => Environment::Live,
            Some(other) => {
                return Err(Error::Config(format!(
                    "IG_ENVIRONMENT must be 'DEMO' or 'LIVE', got '{other}'"
                )))
            }
        };

        Ok(Settings {
            ig_api_key: lookup("IG_API_KEY").unwrap_or_default(),
            ig_username: lookup("IG_USERNAME").unwrap_or_default(),
            ig_password: lookup("IG_PASSWORD").unwrap_or_default(),
            environment,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
        })
    }

    /// Check that broker credentials are present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("IG_API_KEY", &self.ig_api_key),
            ("IG_USERNAME", &self.ig_username),
            ("IG_PASSWORD", &self.ig_password),
        ]
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(key, _)| *key)
        .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required environment variables: {}. Check your .env file.",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}
