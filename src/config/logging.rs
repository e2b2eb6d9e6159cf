//! Logging configuration

use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::error::ConfigError;

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_filter() -> String {
    "membership_engine=info".to_string()
}

impl LoggingConfig {
    /// Installs the global subscriber.
    ///
    /// Fails if a global subscriber is already set.
    pub fn init_tracing(&self) -> Result<(), ConfigError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.filter))
            .map_err(|e| ConfigError::Logging(e.to_string()))?;

        let registry = tracing_subscriber::registry().with(filter);
        let result = if self.json {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer()).try_init()
        };
        result.map_err(|e| ConfigError::Logging(e.to_string()))
    }
}
