//! SubscribeHandler - Command handler for starting (or repeating) a purchase.

use tracing::info;

use crate::adapters::gateway::FREE_GATEWAY_ID;
use crate::domain::foundation::{GatewayId, MemberId, MembershipId, Timestamp};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::domain::membership::{Membership, PricingMode};
use crate::domain::subscription::{Subscription, SubscriptionStatus};

use super::invoicing::{issue_invoice, InvoiceAdjustments, InvoicePurpose};
use super::settlement::settle_paid;
use super::{BillingServices, LifecycleError};

/// Command to subscribe a member to a plan.
#[derive(Debug, Clone)]
pub struct SubscribeCommand {
    pub member_id: MemberId,
    pub membership_id: MembershipId,
    pub gateway_id: Option<GatewayId>,
    pub coupon_code: Option<String>,
}

impl SubscribeCommand {
    pub fn new(member_id: MemberId, membership_id: MembershipId) -> Self {
        Self {
            member_id,
            membership_id,
            gateway_id: None,
            coupon_code: None,
        }
    }

    pub fn via(mut self, gateway_id: GatewayId) -> Self {
        self.gateway_id = Some(gateway_id);
        self
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }
}

/// Result of a subscribe call.
#[derive(Debug, Clone)]
pub struct SubscribeResult {
    pub subscription: Subscription,
    /// Invoice to pay next with `AttemptPurchaseHandler`.
    pub invoice: Invoice,
    /// True if an existing subscription for the same plan was reused.
    pub reused: bool,
}

impl SubscribeResult {
    pub fn is_trial(&self) -> bool {
        self.invoice.trial
    }
}

/// Handler for subscribing.
///
/// At most one current subscription exists per member and plan: a repeat
/// purchase reuses it and bills the next period instead of opening a
/// duplicate. A trial is offered once per member and plan, ever: a free
/// trial starts immediately, a paid one once its trial invoice is paid.
pub struct SubscribeHandler {
    services: BillingServices,
}

impl SubscribeHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    pub async fn handle(&self, cmd: SubscribeCommand) -> Result<SubscribeResult, LifecycleError> {
        self.handle_at(cmd, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        cmd: SubscribeCommand,
        now: Timestamp,
    ) -> Result<SubscribeResult, LifecycleError> {
        // 1. Validate the plan
        let membership = self.services.load_membership(&cmd.membership_id).await?;
        ensure_purchasable(&membership, now)?;

        let adjustments = InvoiceAdjustments {
            coupon_code: cmd.coupon_code.clone(),
            pro_rate_cents: 0,
        };

        // 2. Reuse the current subscription for this pair, if any
        if let Some(existing) = self
            .services
            .subscriptions
            .find_current(&cmd.member_id, &cmd.membership_id)
            .await?
        {
            let invoice = self.invoice_for_existing(&existing, &membership, &adjustments, now).await?;
            info!(
                subscription_id = %existing.id,
                member_id = %cmd.member_id,
                status = %existing.status,
                "Repeat purchase reuses current subscription"
            );
            return Ok(SubscribeResult {
                subscription: existing,
                invoice,
                reused: true,
            });
        }

        // 3. Open a new subscription
        let mut member = self.services.load_or_create_member(&cmd.member_id).await?;
        let subscription =
            Subscription::new_pending(cmd.member_id.clone(), membership.id, cmd.gateway_id, now);
        self.services.subscriptions.insert(&subscription).await?;
        member.attach_subscription(subscription.id);
        self.services.members.save(&member).await?;

        // 4. Bill the trial if still eligible, otherwise the full price
        let purpose = if membership.has_trial() && !member.has_used_trial(&membership.id) {
            InvoicePurpose::Trial
        } else {
            InvoicePurpose::Initial
        };
        let invoice =
            issue_invoice(&self.services, &subscription, &membership, purpose, &adjustments, now)
                .await?;

        // 5. A free trial starts on subscribe
        let (invoice, subscription) = if invoice.trial && invoice.is_zero_total() {
            let mut invoice = invoice;
            invoice.set_gateway(GatewayId::known(FREE_GATEWAY_ID))?;
            settle_paid(&self.services, invoice, subscription, None, None, now).await?
        } else {
            (invoice, subscription)
        };

        info!(
            subscription_id = %subscription.id,
            member_id = %cmd.member_id,
            membership_id = %membership.id,
            status = %subscription.status,
            trial = invoice.trial,
            "Subscription created"
        );

        Ok(SubscribeResult {
            subscription,
            invoice,
            reused: false,
        })
    }

    /// Outstanding invoice of a pending subscription, or the next period's
    /// invoice of a running one.
    async fn invoice_for_existing(
        &self,
        subscription: &Subscription,
        membership: &Membership,
        adjustments: &InvoiceAdjustments,
        now: Timestamp,
    ) -> Result<Invoice, LifecycleError> {
        let outstanding = self
            .services
            .invoices
            .find_by_subscription(&subscription.id)
            .await?
            .into_iter()
            .rev()
            .find(|i| i.status() == InvoiceStatus::Pending);
        if let Some(invoice) = outstanding {
            return Ok(invoice);
        }

        if subscription.status == SubscriptionStatus::Active && subscription.expire_date.is_none() {
            return Err(LifecycleError::invalid_state(format!(
                "Subscription {} already has perpetual access",
                subscription.id
            )));
        }

        let purpose = InvoicePurpose::for_subscription(subscription);
        issue_invoice(&self.services, subscription, membership, purpose, adjustments, now).await
    }
}

fn ensure_purchasable(membership: &Membership, now: Timestamp) -> Result<(), LifecycleError> {
    if membership.is_special() {
        return Err(LifecycleError::validation(format!(
            "Membership '{}' is reserved and cannot be purchased",
            membership.name
        )));
    }
    if !membership.active {
        return Err(LifecycleError::validation(format!(
            "Membership '{}' is not active",
            membership.name
        )));
    }
    if let PricingMode::DateRange { end, .. } = membership.pricing {
        if !now.is_before(&end) {
            return Err(LifecycleError::validation(format!(
                "Membership '{}' ended on {}",
                membership.name, end
            )));
        }
    }
    Ok(())
}
