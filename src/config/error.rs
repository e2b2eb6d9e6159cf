//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Logging initialisation failed: {0}")]
    Logging(String),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Currency must be a three-letter ISO-4217 code, got '{0}'")]
    InvalidCurrency(String),

    #[error("Invalid gateway timeout")]
    InvalidTimeout,

    #[error("Tax rate exceeds 100% ({0} bps)")]
    TaxRateTooHigh(u32),

    #[error("Grace period exceeds maximum allowed (90 days)")]
    GracePeriodTooLong,

    #[error("Invoice numbers start at 1")]
    InvalidInvoiceStart,
}
