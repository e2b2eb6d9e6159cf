//! Payment gateway port.
//!
//! Each payment processor implements `Gateway`. The lifecycle handlers only
//! see this contract: they never assume recurring support and never treat a
//! missing answer as a payment.
//!
//! # Design
//!
//! - **Structured results**: `charge` returns a `ChargeResult`, declines and
//!   network trouble are values, not errors
//! - **Out-of-band settlement**: a gateway may answer `Pending` and settle
//!   later through a confirmation keyed by `(gateway_id, transaction_id)`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::GatewayId;
use crate::domain::invoice::Invoice;
use crate::domain::member::PaymentProfile;

/// Payment data supplied with a purchase or taken from a stored profile.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Tokenised card or customer reference.
    pub token: Option<String>,

    /// Store the token as the member's profile for this gateway.
    #[serde(default)]
    pub save_profile: bool,
}

impl PaymentDetails {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            save_profile: false,
        }
    }

    pub fn from_profile(profile: &PaymentProfile) -> Self {
        Self::with_token(profile.token.clone())
    }

    pub fn saving_profile(mut self) -> Self {
        self.save_profile = true;
        self
    }
}

impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("save_profile", &self.save_profile)
            .finish()
    }
}

/// Outcome of a charge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeResult {
    /// Settled now.
    Succeeded { transaction_id: String },

    /// Accepted; settlement arrives later as a confirmation.
    Pending { transaction_id: String },

    /// Hard decline. Retrying the same details will not help.
    Declined { reason: String },

    /// Timeout or network failure. Safe to retry.
    Transient { reason: String },
}

/// Settlement status reported out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Paid,
    Failed,
    Refunded,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Paid => "paid",
            ConfirmationStatus::Failed => "failed",
            ConfirmationStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConfirmationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(ConfirmationStatus::Paid),
            "failed" => Ok(ConfirmationStatus::Failed),
            "refunded" => Ok(ConfirmationStatus::Refunded),
            other => Err(format!("unknown confirmation status '{}'", other)),
        }
    }
}

/// Port for payment processors.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn id(&self) -> GatewayId;

    /// Whether credentials/settings needed to charge are present.
    fn is_configured(&self) -> bool;

    /// Whether the gateway can charge a stored profile without the member present.
    fn supports_recurring(&self) -> bool;

    /// Whether `charge` needs a payment token.
    fn requires_token(&self) -> bool {
        false
    }

    /// Attempt to charge an invoice's total.
    async fn charge(&self, invoice: &Invoice, details: &PaymentDetails) -> ChargeResult;
}
