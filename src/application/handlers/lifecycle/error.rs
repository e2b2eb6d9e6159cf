//! Errors returned by the lifecycle handlers.
//!
//! | Error | Invoice | Subscription |
//! |-------|---------|--------------|
//! | Configuration | untouched | unchanged |
//! | Validation | not created / untouched | unchanged |
//! | GatewayDeclined | `failed` | unchanged |
//! | GatewayTransient | stays `pending` | unchanged |
//! | ConcurrencyConflict | stays `pending` | changed by another writer |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, InvoiceId, ValidationError};

/// Lifecycle failure. Always returned to the caller, never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Gateway unknown or missing its settings. Raised before any charge.
    #[error("Gateway '{gateway_id}' unavailable: {reason}")]
    Configuration { gateway_id: String, reason: String },

    /// Malformed request, rejected before any state change.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Payment declined for invoice {invoice_id}: {reason}")]
    GatewayDeclined { invoice_id: InvoiceId, reason: String },

    /// Timeout or network failure. The invoice is still pending.
    #[error("Payment gateway unavailable for invoice {invoice_id}: {reason}")]
    GatewayTransient { invoice_id: InvoiceId, reason: String },

    /// The subscription changed since it was loaded. Re-fetch and retry.
    #[error("Subscription {subscription_id} was modified concurrently")]
    ConcurrencyConflict { subscription_id: String },

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl LifecycleError {
    pub fn configuration(gateway_id: impl Into<String>, reason: impl Into<String>) -> Self {
        LifecycleError::Configuration {
            gateway_id: gateway_id.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LifecycleError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        LifecycleError::NotFound(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        LifecycleError::InvalidState(message.into())
    }

    /// Returns true if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::GatewayTransient { .. } | LifecycleError::ConcurrencyConflict { .. }
        )
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, LifecycleError::ConcurrencyConflict { .. })
    }
}

impl From<DomainError> for LifecycleError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ConcurrencyConflict => LifecycleError::ConcurrencyConflict {
                subscription_id: err
                    .details
                    .get("subscription_id")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
            },
            code if code.is_not_found() => LifecycleError::NotFound(err.message),
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => LifecycleError::Validation(err.message),
            ErrorCode::InvalidStateTransition
            | ErrorCode::InvoiceImmutable
            | ErrorCode::SpecialMembership => LifecycleError::InvalidState(err.message),
            _ => LifecycleError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for LifecycleError {
    fn from(err: ValidationError) -> Self {
        LifecycleError::Validation(err.to_string())
    }
}
