//! Signature verification for out-of-band payment confirmations.
//!
//! A confirmation arriving over an untrusted transport carries an
//! HMAC-SHA256 signature over `gateway_id.transaction_id.status.timestamp`.
//! It is only handed to the lifecycle after the signature and timestamp
//! check out.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::domain::foundation::{GatewayId, Timestamp};
use crate::ports::ConfirmationStatus;

/// Maximum allowed age for a confirmation (5 minutes).
const MAX_CONFIRMATION_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future confirmations (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Errors from confirmation verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationError {
    #[error("Invalid signature")]
    InvalidSignature,

    /// Older than the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Further in the future than the skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Malformed confirmation: {0}")]
    Malformed(String),
}

/// Confirmation as received from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedConfirmation {
    pub gateway_id: String,
    pub transaction_id: String,
    pub status: String,
    /// Unix seconds when the confirmation was signed.
    pub timestamp: i64,
    /// Hex-encoded HMAC-SHA256.
    pub signature: String,
}

/// Confirmation whose signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedConfirmation {
    pub gateway_id: GatewayId,
    pub transaction_id: String,
    pub status: ConfirmationStatus,
}

/// Verifies signed confirmations with a shared secret.
pub struct ConfirmationVerifier {
    secret: SecretString,
}

impl ConfirmationVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifier for the configured confirmation secret, if any.
    pub fn from_config(config: &GatewayConfig) -> Option<Self> {
        config.confirmation_secret.clone().map(Self::new)
    }

    /// Verifies a confirmation against the clock.
    ///
    /// # Verification Steps
    ///
    /// 1. Validate timestamp is within the replay window
    /// 2. Decode the signature
    /// 3. Recompute the HMAC and compare in constant time
    /// 4. Parse gateway id and status
    pub fn verify(
        &self,
        confirmation: &SignedConfirmation,
        now: Timestamp,
    ) -> Result<VerifiedConfirmation, ConfirmationError> {
        // 1. Validate timestamp
        let age = now.as_unix_secs() - confirmation.timestamp;
        if age > MAX_CONFIRMATION_AGE_SECS {
            return Err(ConfirmationError::TimestampOutOfRange);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(ConfirmationError::InvalidTimestamp);
        }

        // 2. Decode signature
        let provided = hex::decode(&confirmation.signature)
            .map_err(|_| ConfirmationError::Malformed("signature is not hex".to_string()))?;

        // 3. Compare (constant-time)
        let expected = self.mac(
            &confirmation.gateway_id,
            &confirmation.transaction_id,
            &confirmation.status,
            confirmation.timestamp,
        )?;
        if !constant_time_compare(&expected, &provided) {
            return Err(ConfirmationError::InvalidSignature);
        }

        // 4. Parse fields
        let gateway_id = GatewayId::new(confirmation.gateway_id.clone())
            .map_err(|e| ConfirmationError::Malformed(e.to_string()))?;
        let status = confirmation
            .status
            .parse::<ConfirmationStatus>()
            .map_err(ConfirmationError::Malformed)?;

        Ok(VerifiedConfirmation {
            gateway_id,
            transaction_id: confirmation.transaction_id.clone(),
            status,
        })
    }

    /// Produces a signed confirmation. Used by gateways that relay
    /// settlements and by tests.
    pub fn sign(
        &self,
        gateway_id: &GatewayId,
        transaction_id: &str,
        status: ConfirmationStatus,
        timestamp: i64,
    ) -> Result<SignedConfirmation, ConfirmationError> {
        let mac = self.mac(gateway_id.as_str(), transaction_id, status.as_str(), timestamp)?;
        Ok(SignedConfirmation {
            gateway_id: gateway_id.to_string(),
            transaction_id: transaction_id.to_string(),
            status: status.to_string(),
            timestamp,
            signature: hex::encode(mac),
        })
    }

    fn mac(
        &self,
        gateway_id: &str,
        transaction_id: &str,
        status: &str,
        timestamp: i64,
    ) -> Result<Vec<u8>, ConfirmationError> {
        let signed_payload = format!("{}.{}.{}.{}", gateway_id, transaction_id, status, timestamp);
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| ConfirmationError::Malformed(e.to_string()))?;
        mac.update(signed_payload.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "confirm_test_secret_12345";

    fn verifier() -> ConfirmationVerifier {
        ConfirmationVerifier::new(SecretString::new(TEST_SECRET.to_string()))
    }

    fn card() -> GatewayId {
        GatewayId::new("card").unwrap()
    }

    fn signed_now(status: ConfirmationStatus) -> (SignedConfirmation, Timestamp) {
        let now = Timestamp::now();
        let signed = verifier()
            .sign(&card(), "txn_123", status, now.as_unix_secs())
            .unwrap();
        (signed, now)
    }

    #[test]
    fn valid_confirmation_verifies() {
        let (signed, now) = signed_now(ConfirmationStatus::Paid);
        let verified = verifier().verify(&signed, now).unwrap();

        assert_eq!(verified.gateway_id, card());
        assert_eq!(verified.transaction_id, "txn_123");
        assert_eq!(verified.status, ConfirmationStatus::Paid);
    }

    #[test]
    fn tampered_status_fails() {
        let (mut signed, now) = signed_now(ConfirmationStatus::Failed);
        signed.status = "paid".to_string();
        assert_eq!(verifier().verify(&signed, now), Err(ConfirmationError::InvalidSignature));
    }

    #[test]
    fn wrong_secret_fails() {
        let (signed, now) = signed_now(ConfirmationStatus::Paid);
        let other = ConfirmationVerifier::new(SecretString::new("other".to_string()));
        assert_eq!(other.verify(&signed, now), Err(ConfirmationError::InvalidSignature));
    }

    #[test]
    fn old_confirmation_is_rejected() {
        let (signed, now) = signed_now(ConfirmationStatus::Paid);
        let later = now.add_days(1);
        assert_eq!(
            verifier().verify(&signed, later),
            Err(ConfirmationError::TimestampOutOfRange)
        );
    }

    #[test]
    fn future_confirmation_is_rejected() {
        let now = Timestamp::now();
        let signed = verifier()
            .sign(&card(), "txn_1", ConfirmationStatus::Paid, now.as_unix_secs() + 3_600)
            .unwrap();
        assert_eq!(verifier().verify(&signed, now), Err(ConfirmationError::InvalidTimestamp));
    }

    #[test]
    fn non_hex_signature_is_malformed() {
        let (mut signed, now) = signed_now(ConfirmationStatus::Paid);
        signed.signature = "zz-not-hex".to_string();
        assert!(matches!(
            verifier().verify(&signed, now),
            Err(ConfirmationError::Malformed(_))
        ));
    }

    #[test]
    fn from_config_requires_secret() {
        assert!(ConfirmationVerifier::from_config(&GatewayConfig::default()).is_none());

        let config = GatewayConfig {
            confirmation_secret: Some(SecretString::new(TEST_SECRET.to_string())),
            ..Default::default()
        };
        let (signed, now) = signed_now(ConfirmationStatus::Refunded);
        let verified = ConfirmationVerifier::from_config(&config)
            .unwrap()
            .verify(&signed, now)
            .unwrap();
        assert_eq!(verified.status, ConfirmationStatus::Refunded);
    }

    #[test]
    fn constant_time_compare_checks_length() {
        assert!(constant_time_compare(b"abc", b"abc"));
        assert!(!constant_time_compare(b"abc", b"abd"));
        assert!(!constant_time_compare(b"abc", b"ab"));
    }
}
