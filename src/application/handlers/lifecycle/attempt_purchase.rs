//! AttemptPurchaseHandler - Command handler for paying an invoice.

use crate::domain::foundation::{GatewayId, InvoiceId, Timestamp};
use crate::ports::PaymentDetails;

use super::settlement::charge_invoice;
use super::{BillingServices, LifecycleError, PurchaseOutcome};

/// Command to pay a pending invoice.
#[derive(Debug, Clone)]
pub struct AttemptPurchaseCommand {
    pub invoice_id: InvoiceId,
    /// Overrides the invoice's and subscription's gateway.
    pub gateway_id: Option<GatewayId>,
    pub payment: PaymentDetails,
}

impl AttemptPurchaseCommand {
    pub fn new(invoice_id: InvoiceId) -> Self {
        Self {
            invoice_id,
            gateway_id: None,
            payment: PaymentDetails::none(),
        }
    }

    pub fn via(mut self, gateway_id: GatewayId) -> Self {
        self.gateway_id = Some(gateway_id);
        self
    }

    pub fn with_payment(mut self, payment: PaymentDetails) -> Self {
        self.payment = payment;
        self
    }
}

/// Handler for purchase attempts.
///
/// Runs one attempt to completion and reports the outcome. Nothing is
/// retried here; retry policy belongs to the caller.
///
/// | Gateway answer | Invoice | Subscription | Returns |
/// |----------------|---------|--------------|---------|
/// | (zero total) | paid | transitioned | `Paid` |
/// | success | paid | transitioned | `Paid` |
/// | pending | pending + transaction id | unchanged | `AwaitingConfirmation` |
/// | declined | failed | unchanged | `GatewayDeclined` |
/// | timeout / network | pending | unchanged | `GatewayTransient` |
pub struct AttemptPurchaseHandler {
    services: BillingServices,
}

impl AttemptPurchaseHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    pub async fn handle(
        &self,
        cmd: AttemptPurchaseCommand,
    ) -> Result<PurchaseOutcome, LifecycleError> {
        self.handle_at(cmd, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        cmd: AttemptPurchaseCommand,
        now: Timestamp,
    ) -> Result<PurchaseOutcome, LifecycleError> {
        let invoice = self.services.load_invoice(&cmd.invoice_id).await?;
        let subscription = self.services.load_subscription(&invoice.subscription_id).await?;

        charge_invoice(
            &self.services,
            invoice,
            subscription,
            cmd.gateway_id,
            cmd.payment,
            now,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingConfig;
    use crate::domain::foundation::Period;
    use crate::domain::invoice::InvoiceStatus;
    use crate::domain::membership::{PricingMode, TrialTerms};
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::{ChargeResult, MemberRepository, MembershipRepository, SubscriptionRepository};

    use super::super::test_support::{card_id, manual_id, member_id, ts, Harness};
    use super::super::{
        CreateInvoiceCommand, CreateInvoiceHandler, SubscribeCommand, SubscribeHandler,
        SubscribeResult,
    };

    async fn subscribe(h: &Harness, price_cents: i64, gateway: Option<GatewayId>) -> SubscribeResult {
        let plan = h.monthly(price_cents).await;
        let mut cmd = SubscribeCommand::new(member_id(), plan.id);
        if let Some(gateway) = gateway {
            cmd = cmd.via(gateway);
        }
        SubscribeHandler::new(h.services.clone()).handle(cmd).await.unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Successful charges
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn successful_charge_activates_for_one_cycle() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, Some(card_id())).await;
        let now = ts("2026-01-15T10:00:00Z");

        let outcome = AttemptPurchaseHandler::new(h.services.clone())
            .handle_at(AttemptPurchaseCommand::new(sub.invoice.id), now)
            .await
            .unwrap();

        assert!(outcome.is_paid());
        assert_eq!(outcome.invoice().status(), InvoiceStatus::Paid);
        assert_eq!(outcome.invoice().external_id(), Some("txn_1"));
        assert_eq!(outcome.subscription().status, SubscriptionStatus::Active);
        assert_eq!(outcome.subscription().expire_date, Some(ts("2026-02-15T10:00:00Z")));
        assert_eq!(h.card.call_count(), 1);

        assert!(h.bus.has_event("subscription.state_changed.v1"));
        assert!(h.bus.has_event("invoice.settled.v1"));
    }

    #[tokio::test]
    async fn gateway_override_is_recorded_on_subscription() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, None).await;

        let outcome = AttemptPurchaseHandler::new(h.services.clone())
            .handle(AttemptPurchaseCommand::new(sub.invoice.id).via(card_id()))
            .await
            .unwrap();

        assert_eq!(outcome.subscription().gateway_id, Some(card_id()));
        assert_eq!(outcome.invoice().gateway_id, Some(card_id()));
    }

    #[tokio::test]
    async fn save_profile_stores_token_for_gateway() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, Some(card_id())).await;

        AttemptPurchaseHandler::new(h.services.clone())
            .handle(
                AttemptPurchaseCommand::new(sub.invoice.id)
                    .with_payment(PaymentDetails::with_token("tok_visa").saving_profile()),
            )
            .await
            .unwrap();

        let member = h.members.find_by_id(&member_id()).await.unwrap().unwrap();
        assert_eq!(member.profile(&card_id()).map(|p| p.token.as_str()), Some("tok_visa"));
    }

    #[tokio::test]
    async fn zero_total_settles_without_calling_a_gateway() {
        let h = Harness::new().await;
        let plan = h.plan(PricingMode::Free, 0, TrialTerms::disabled()).await;
        let sub = SubscribeHandler::new(h.services.clone())
            .handle(SubscribeCommand::new(member_id(), plan.id).via(card_id()))
            .await
            .unwrap();

        let outcome = AttemptPurchaseHandler::new(h.services.clone())
            .handle(AttemptPurchaseCommand::new(sub.invoice.id))
            .await
            .unwrap();

        assert!(outcome.is_paid());
        assert_eq!(outcome.subscription().status, SubscriptionStatus::Active);
        assert_eq!(outcome.subscription().expire_date, None);
        assert_eq!(outcome.invoice().gateway_id.as_ref().map(|g| g.as_str()), Some("free"));
        assert!(!h.card.was_called());
    }

    #[tokio::test]
    async fn paid_trial_starts_trial_and_records_history() {
        let h = Harness::new().await;
        let plan = h
            .plan(
                PricingMode::Recurring { cycle: Period::months(1) },
                2_000,
                TrialTerms::paid(Period::days(14), 100),
            )
            .await;
        let sub = SubscribeHandler::new(h.services.clone())
            .handle(SubscribeCommand::new(member_id(), plan.id).via(card_id()))
            .await
            .unwrap();
        assert_eq!(sub.subscription.status, SubscriptionStatus::Pending);
        let now = ts("2026-01-01T00:00:00Z");

        let outcome = AttemptPurchaseHandler::new(h.services.clone())
            .handle_at(AttemptPurchaseCommand::new(sub.invoice.id), now)
            .await
            .unwrap();

        assert_eq!(outcome.subscription().status, SubscriptionStatus::Trial);
        assert_eq!(outcome.subscription().trial_end, Some(ts("2026-01-15T00:00:00Z")));
        assert_eq!(h.card.call_count(), 1);

        let member = h.members.find_by_id(&member_id()).await.unwrap().unwrap();
        assert!(member.has_used_trial(&plan.id));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failed charges
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn decline_fails_invoice_and_leaves_subscription_pending() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, Some(card_id())).await;
        h.card.push_outcome(ChargeResult::Declined {
            reason: "insufficient funds".to_string(),
        });

        let err = AttemptPurchaseHandler::new(h.services.clone())
            .handle(AttemptPurchaseCommand::new(sub.invoice.id))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::GatewayDeclined { .. }));
        assert!(!err.is_retryable());

        let invoice = h.services.load_invoice(&sub.invoice.id).await.unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Failed);
        let stored = h.subscriptions.find_by_id(&sub.subscription.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
        assert_eq!(stored.version, sub.subscription.version);
    }

    #[tokio::test]
    async fn transient_failure_leaves_invoice_pending() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, Some(card_id())).await;
        h.card.push_outcome(ChargeResult::Transient {
            reason: "connection reset".to_string(),
        });
        let handler = AttemptPurchaseHandler::new(h.services.clone());

        let err = handler
            .handle(AttemptPurchaseCommand::new(sub.invoice.id))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            h.services.load_invoice(&sub.invoice.id).await.unwrap().status(),
            InvoiceStatus::Pending
        );

        let retried = handler.handle(AttemptPurchaseCommand::new(sub.invoice.id)).await.unwrap();
        assert!(retried.is_paid());
        assert_eq!(h.card.call_count(), 2);
    }

    #[tokio::test]
    async fn gateway_timeout_is_transient() {
        let billing = BillingConfig {
            gateway_timeout_secs: 1,
            ..BillingConfig::default()
        };
        let h = Harness::with_billing(billing).await;
        let sub = subscribe(&h, 1_500, Some(card_id())).await;
        let _gate = h.card.hold_next_charge();

        let err = AttemptPurchaseHandler::new(h.services.clone())
            .handle(AttemptPurchaseCommand::new(sub.invoice.id))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::GatewayTransient { .. }));
        let stored = h.subscriptions.find_by_id(&sub.subscription.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_before_charging() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, None).await;
        let offline = std::sync::Arc::new(crate::adapters::gateway::MockGateway::new("offline").unconfigured());
        let services = BillingServices {
            gateways: h.services.gateways.clone().with(offline.clone()),
            ..h.services.clone()
        };

        let err = AttemptPurchaseHandler::new(services)
            .handle(AttemptPurchaseCommand::new(sub.invoice.id).via(GatewayId::new("offline").unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Configuration { .. }));
        assert!(!offline.was_called());
        assert_eq!(
            h.services.load_invoice(&sub.invoice.id).await.unwrap().status(),
            InvoiceStatus::Pending
        );
    }

    #[tokio::test]
    async fn unknown_gateway_is_configuration_error() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, None).await;

        let err = AttemptPurchaseHandler::new(h.services.clone())
            .handle(AttemptPurchaseCommand::new(sub.invoice.id).via(GatewayId::new("paypal").unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Configuration { .. }));
    }

    #[tokio::test]
    async fn missing_gateway_is_validation_error() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, None).await;

        let err = AttemptPurchaseHandler::new(h.services.clone())
            .handle(AttemptPurchaseCommand::new(sub.invoice.id))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn token_gateway_rejects_missing_token() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, None).await;
        let strict = std::sync::Arc::new(crate::adapters::gateway::MockGateway::new("strict").requiring_token());
        let services = BillingServices {
            gateways: h.services.gateways.clone().with(strict.clone()),
            ..h.services.clone()
        };

        let err = AttemptPurchaseHandler::new(services)
            .handle(AttemptPurchaseCommand::new(sub.invoice.id).via(GatewayId::new("strict").unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Validation(_)));
        assert!(!strict.was_called());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Preconditions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn pending_charge_awaits_confirmation_and_blocks_recharge() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, Some(manual_id())).await;
        let handler = AttemptPurchaseHandler::new(h.services.clone());

        let outcome = handler.handle(AttemptPurchaseCommand::new(sub.invoice.id)).await.unwrap();
        assert!(!outcome.is_paid());
        assert!(outcome.invoice().external_id().is_some());
        assert_eq!(outcome.subscription().status, SubscriptionStatus::Pending);

        let err = handler.handle(AttemptPurchaseCommand::new(sub.invoice.id)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState(_)));
        assert_eq!(h.manual.call_count(), 1);
    }

    #[tokio::test]
    async fn paid_invoice_cannot_be_charged_again() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, Some(card_id())).await;
        let handler = AttemptPurchaseHandler::new(h.services.clone());
        handler.handle(AttemptPurchaseCommand::new(sub.invoice.id)).await.unwrap();

        let err = handler.handle(AttemptPurchaseCommand::new(sub.invoice.id)).await.unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidState(_)));
        assert_eq!(h.card.call_count(), 1);
    }

    #[tokio::test]
    async fn stale_trial_invoice_is_rejected_before_charging() {
        let h = Harness::new().await;
        let plan = h
            .plan(
                PricingMode::Recurring { cycle: Period::months(1) },
                2_000,
                TrialTerms::paid(Period::days(14), 100),
            )
            .await;
        let sub = SubscribeHandler::new(h.services.clone())
            .handle(SubscribeCommand::new(member_id(), plan.id).via(card_id()))
            .await
            .unwrap();
        assert!(sub.invoice.trial);

        // Skip the trial: bill and pay the full first period instead.
        let full = CreateInvoiceHandler::new(h.services.clone())
            .handle(CreateInvoiceCommand::new(sub.subscription.id))
            .await
            .unwrap();
        let handler = AttemptPurchaseHandler::new(h.services.clone());
        let paid = handler.handle(AttemptPurchaseCommand::new(full.id)).await.unwrap();
        assert_eq!(paid.subscription().status, SubscriptionStatus::Active);
        assert_eq!(h.card.call_count(), 1);

        let err = handler
            .handle(AttemptPurchaseCommand::new(sub.invoice.id))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidState(_)));
        assert_eq!(h.card.call_count(), 1);
        let trial_invoice = h.services.load_invoice(&sub.invoice.id).await.unwrap();
        assert_eq!(trial_invoice.status(), InvoiceStatus::Pending);
        assert_eq!(trial_invoice.external_id(), None);
    }

    #[tokio::test]
    async fn charge_that_cannot_be_applied_is_recorded_on_invoice() {
        let h = Harness::new().await;
        let sub = subscribe(&h, 1_500, Some(card_id())).await;
        let gate = h.card.hold_next_charge();
        let purchase = {
            let services = h.services.clone();
            let invoice_id = sub.invoice.id;
            tokio::spawn(async move {
                AttemptPurchaseHandler::new(services)
                    .handle(AttemptPurchaseCommand::new(invoice_id))
                    .await
            })
        };
        gate.wait_started().await;

        // The plan disappears while the gateway is charging.
        h.memberships.delete(&sub.subscription.membership_id).await.unwrap();
        gate.release();

        let err = purchase.await.unwrap().unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));

        let invoice = h.services.load_invoice(&sub.invoice.id).await.unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Pending);
        assert_eq!(invoice.external_id(), Some("txn_1"));
        assert!(invoice.notes().iter().any(|n| n.contains("txn_1")));
        let stored = h.subscriptions.find_by_id(&sub.subscription.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_invoice_is_not_found() {
        let h = Harness::new().await;
        let err = AttemptPurchaseHandler::new(h.services.clone())
            .handle(AttemptPurchaseCommand::new(InvoiceId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }
}
