//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `MEMBERSHIP_ENGINE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use membership_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! config.logging.init_tracing().expect("Failed to install logging");
//! ```

mod billing;
mod error;
mod gateways;
mod logging;

pub use billing::BillingConfig;
pub use error::{ConfigError, ValidationError};
pub use gateways::GatewayConfig;
pub use logging::LoggingConfig;

use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "MEMBERSHIP_ENGINE";

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a working
/// engine with only the free gateway configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Currency, tax, grace window and gateway timeout
    #[serde(default)]
    pub billing: BillingConfig,

    /// Gateway credentials
    #[serde(default)]
    pub gateways: GatewayConfig,

    /// Log filter and format
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `MEMBERSHIP_ENGINE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `MEMBERSHIP_ENGINE__BILLING__CURRENCY=EUR` -> `billing.currency = "EUR"`
    /// - `MEMBERSHIP_ENGINE__GATEWAYS__CARD_API_KEY=...` -> `gateways.card_api_key`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a TOML or JSON file, with environment
    /// variables layered on top.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.billing.validate()?;
        self.gateways.validate()?;
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::default()
        .prefix(ENV_PREFIX)
        .separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("MEMBERSHIP_ENGINE__BILLING__CURRENCY");
        env::remove_var("MEMBERSHIP_ENGINE__BILLING__GRACE_PERIOD_DAYS");
        env::remove_var("MEMBERSHIP_ENGINE__GATEWAYS__CARD_API_KEY");
        env::remove_var("MEMBERSHIP_ENGINE__LOGGING__JSON");
    }

    #[test]
    fn test_load_with_empty_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.billing.currency, "USD");
        assert_eq!(config.billing.grace_period_days, 3);
        assert!(config.gateways.card_api_key.is_none());
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("MEMBERSHIP_ENGINE__BILLING__CURRENCY", "EUR");
        env::set_var("MEMBERSHIP_ENGINE__BILLING__GRACE_PERIOD_DAYS", "7");
        env::set_var("MEMBERSHIP_ENGINE__GATEWAYS__CARD_API_KEY", "sk_test_xxx");
        env::set_var("MEMBERSHIP_ENGINE__LOGGING__JSON", "true");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.billing.currency, "EUR");
        assert_eq!(config.billing.grace_period_days, 7);
        assert_eq!(
            config.gateways.card_api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("sk_test_xxx")
        );
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_toml_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[billing]\ncurrency = \"GBP\"\ntax_name = \"VAT\"\ntax_rate_bps = 2000\n\n[gateways]\nmanual_instructions = \"Pay by bank transfer\""
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.billing.currency, "GBP");
        assert_eq!(config.billing.tax_line().map(|t| t.rate_bps), Some(2000));
        assert_eq!(
            config.gateways.manual_instructions.as_deref(),
            Some("Pay by bank transfer")
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[billing]\ncurrency = \"GBP\"").unwrap();

        env::set_var("MEMBERSHIP_ENGINE__BILLING__CURRENCY", "CAD");
        let result = AppConfig::load_from_file(file.path());
        clear_env();

        assert_eq!(result.unwrap().billing.currency, "CAD");
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"billing": {{"gateway_timeout_secs": 0}}}}"#).unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));
    }
}
