//! Gateway for zero-total invoices.

use async_trait::async_trait;

use crate::domain::foundation::GatewayId;
use crate::domain::invoice::Invoice;
use crate::ports::{ChargeResult, Gateway, PaymentDetails};

pub const FREE_GATEWAY_ID: &str = "free";

/// Settles invoices whose total is zero and declines anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeGateway;

impl FreeGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Gateway for FreeGateway {
    fn id(&self) -> GatewayId {
        GatewayId::known(FREE_GATEWAY_ID)
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn supports_recurring(&self) -> bool {
        false
    }

    async fn charge(&self, invoice: &Invoice, _details: &PaymentDetails) -> ChargeResult {
        if invoice.is_zero_total() {
            ChargeResult::Succeeded {
                transaction_id: format!("free-{}", invoice.id),
            }
        } else {
            ChargeResult::Declined {
                reason: format!(
                    "free gateway cannot collect {} {}",
                    invoice.total_cents(),
                    invoice.currency
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{MemberId, MembershipId, SubscriptionId, Timestamp};

    fn invoice(amount: i64) -> Invoice {
        Invoice::new(
            SubscriptionId::new(),
            MemberId::new("m").unwrap(),
            MembershipId::new(),
            1,
            "USD",
            amount,
            Timestamp::now(),
            false,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn settles_only_zero_totals() {
        let gw = FreeGateway::new();
        assert!(matches!(
            gw.charge(&invoice(0), &PaymentDetails::none()).await,
            ChargeResult::Succeeded { .. }
        ));
        assert!(matches!(
            gw.charge(&invoice(500), &PaymentDetails::none()).await,
            ChargeResult::Declined { .. }
        ));
    }
}
