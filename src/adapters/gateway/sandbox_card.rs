//! Card gateway running against a sandbox processor.
//!
//! Stands in for a hosted card processor. The outcome is chosen by the
//! card token so every path can be exercised end to end:
//!
//! | token prefix  | outcome    |
//! |---------------|------------|
//! | `tok_decline` | Declined   |
//! | `tok_timeout` | Transient  |
//! | `tok_async`   | Pending    |
//! | anything else | Succeeded  |

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::domain::foundation::GatewayId;
use crate::domain::invoice::Invoice;
use crate::ports::{ChargeResult, Gateway, PaymentDetails};

pub const CARD_GATEWAY_ID: &str = "card";

pub struct SandboxCardGateway {
    api_key: Option<SecretString>,
}

impl SandboxCardGateway {
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.expose_secret().trim().is_empty()),
        }
    }

    fn transaction_id() -> String {
        format!("ch_{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl Gateway for SandboxCardGateway {
    fn id(&self) -> GatewayId {
        GatewayId::known(CARD_GATEWAY_ID)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn supports_recurring(&self) -> bool {
        true
    }

    fn requires_token(&self) -> bool {
        true
    }

    async fn charge(&self, invoice: &Invoice, details: &PaymentDetails) -> ChargeResult {
        let Some(token) = details.token.as_deref() else {
            return ChargeResult::Declined {
                reason: "no card token supplied".to_string(),
            };
        };

        tracing::debug!(
            invoice_id = %invoice.id,
            total_cents = invoice.total_cents(),
            "sandbox card charge"
        );

        if token.starts_with("tok_decline") {
            ChargeResult::Declined {
                reason: "card declined".to_string(),
            }
        } else if token.starts_with("tok_timeout") {
            ChargeResult::Transient {
                reason: "processor timed out".to_string(),
            }
        } else if token.starts_with("tok_async") {
            ChargeResult::Pending {
                transaction_id: Self::transaction_id(),
            }
        } else {
            ChargeResult::Succeeded {
                transaction_id: Self::transaction_id(),
            }
        }
    }
}
