//! CreateInvoiceHandler - Command handler for billing a subscription.

use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::invoice::Invoice;

use super::invoicing::{issue_invoice, InvoiceAdjustments, InvoicePurpose};
use super::{BillingServices, LifecycleError};

/// Command to create a pending invoice for a subscription.
#[derive(Debug, Clone)]
pub struct CreateInvoiceCommand {
    pub subscription_id: SubscriptionId,
    pub coupon_code: Option<String>,
    /// Credit carried over from a plan change, in cents.
    pub pro_rate_cents: i64,
}

impl CreateInvoiceCommand {
    pub fn new(subscription_id: SubscriptionId) -> Self {
        Self {
            subscription_id,
            coupon_code: None,
            pro_rate_cents: 0,
        }
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn with_pro_rate(mut self, cents: i64) -> Self {
        self.pro_rate_cents = cents;
        self
    }
}

/// Handler for creating invoices.
///
/// The purpose follows the subscription's state: a new pending subscription
/// is billed its first period, anything else its next period. Failed
/// invoices are final, so a retry after a decline bills through a fresh
/// invoice created here.
pub struct CreateInvoiceHandler {
    services: BillingServices,
}

impl CreateInvoiceHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    pub async fn handle(&self, cmd: CreateInvoiceCommand) -> Result<Invoice, LifecycleError> {
        self.handle_at(cmd, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        cmd: CreateInvoiceCommand,
        now: Timestamp,
    ) -> Result<Invoice, LifecycleError> {
        if cmd.pro_rate_cents < 0 {
            return Err(LifecycleError::validation("Pro-rate credit cannot be negative"));
        }

        let subscription = self.services.load_subscription(&cmd.subscription_id).await?;
        if !subscription.is_current() {
            return Err(LifecycleError::invalid_state(format!(
                "Subscription {} is {} and no longer billed",
                subscription.id, subscription.status
            )));
        }
        let membership = self.services.load_membership(&subscription.membership_id).await?;

        let adjustments = InvoiceAdjustments {
            coupon_code: cmd.coupon_code,
            pro_rate_cents: cmd.pro_rate_cents,
        };
        issue_invoice(
            &self.services,
            &subscription,
            &membership,
            InvoicePurpose::for_subscription(&subscription),
            &adjustments,
            now,
        )
        .await
    }
}
