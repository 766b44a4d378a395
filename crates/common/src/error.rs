use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A constructor received a period, multiplier or k-value that is not positive.
    #[error("Invalid parameter '{name}': {value} (must be > 0)")]
    InvalidParameter { name: &'static str, value: f64 },

    /// A candle carried negative volume. Indicates a data-quality bug upstream.
    #[error("Volume must be >= 0, got {0}")]
    NegativeVolume(f64),

    #[error("Provider does not support {0}")]
    Unsupported(&'static str),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Order rejected: {0}")]
    Order(String),

    #[error("Invalid timestamp '{0}'")]
    Timestamp(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for the construction-time parameter check.
    pub fn invalid(name: &'static str, value: f64) -> Self {
        Error::InvalidParameter { name, value }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
