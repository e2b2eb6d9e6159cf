//! Offline payment gateway (bank transfer, cheque, ...).

use async_trait::async_trait;

use crate::domain::foundation::GatewayId;
use crate::domain::invoice::Invoice;
use crate::ports::{ChargeResult, Gateway, PaymentDetails};

pub const MANUAL_GATEWAY_ID: &str = "manual";

/// Shows payment instructions and waits for an admin confirmation.
///
/// Every charge comes back `Pending` with a reference derived from the
/// invoice number; the invoice settles when the confirmation arrives.
/// Cannot bill renewals by itself.
#[derive(Debug, Clone, Default)]
pub struct ManualGateway {
    instructions: Option<String>,
}

impl ManualGateway {
    pub fn new(instructions: Option<String>) -> Self {
        Self {
            instructions: instructions.filter(|i| !i.trim().is_empty()),
        }
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Reference a member quotes when paying offline.
    pub fn reference_for(invoice: &Invoice) -> String {
        format!("MAN-{:06}", invoice.number)
    }
}

#[async_trait]
impl Gateway for ManualGateway {
    fn id(&self) -> GatewayId {
        GatewayId::known(MANUAL_GATEWAY_ID)
    }

    fn is_configured(&self) -> bool {
        self.instructions.is_some()
    }

    fn supports_recurring(&self) -> bool {
        false
    }

    async fn charge(&self, invoice: &Invoice, _details: &PaymentDetails) -> ChargeResult {
        ChargeResult::Pending {
            transaction_id: Self::reference_for(invoice),
        }
    }
}
