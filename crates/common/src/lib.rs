pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::Settings;
pub use error::{Error, Result};
pub use provider::{Client, EventHandler, Streamer};
pub use types::*;
