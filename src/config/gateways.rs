//! Gateway configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Payment gateway settings. Gateways without their settings stay
/// registered but report themselves unconfigured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// API key for the card processor
    pub card_api_key: Option<SecretString>,

    /// HMAC key for signed out-of-band confirmations
    pub confirmation_secret: Option<SecretString>,

    /// Payment instructions shown for manual payments
    pub manual_instructions: Option<String>,
}

impl GatewayConfig {
    pub fn has_card_key(&self) -> bool {
        self.card_api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    /// Validate gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(secret) = &self.confirmation_secret {
            if secret.expose_secret().trim().is_empty() {
                return Err(ValidationError::MissingRequired("CONFIRMATION_SECRET"));
            }
        }
        Ok(())
    }
}
