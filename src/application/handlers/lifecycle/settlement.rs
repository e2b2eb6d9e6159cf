//! Charging and settling invoices.
//!
//! Every path that turns a payment into a subscription transition goes
//! through `settle_paid`. The invoice is claimed first with a conditional
//! `pending -> paid` save, then the subscription is committed with
//! compare-and-swap, then events are published. A writer that loses the
//! invoice claim changes nothing. A writer that wins the claim but loses the
//! compare-and-swap puts the invoice back to pending.

use tracing::{info, warn};

use crate::adapters::gateway::FREE_GATEWAY_ID;
use crate::domain::foundation::{ErrorCode, GatewayId, InvoiceId, Timestamp};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::domain::member::PaymentProfile;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{ChargeResult, PaymentDetails};

use super::invoicing::paid_period_start;
use super::services::PendingEvents;
use super::{BillingServices, LifecycleError};

/// Result of a purchase attempt that did not fail.
#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    /// Settled; the subscription has transitioned.
    Paid {
        invoice: Invoice,
        subscription: Subscription,
    },
    /// The gateway accepted the charge and will confirm out of band.
    AwaitingConfirmation {
        invoice: Invoice,
        subscription: Subscription,
    },
}

impl PurchaseOutcome {
    pub fn invoice(&self) -> &Invoice {
        match self {
            PurchaseOutcome::Paid { invoice, .. }
            | PurchaseOutcome::AwaitingConfirmation { invoice, .. } => invoice,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        match self {
            PurchaseOutcome::Paid { subscription, .. }
            | PurchaseOutcome::AwaitingConfirmation { subscription, .. } => subscription,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PurchaseOutcome::Paid { .. })
    }
}

/// Marks an invoice paid and applies the matching subscription transition.
///
/// - Trial invoice: `pending -> trial`, recorded in the member's trial history
/// - Any other invoice: `-> active`, with the paid period starting per
///   `paid_period_start`
pub(crate) async fn settle_paid(
    services: &BillingServices,
    mut invoice: Invoice,
    mut subscription: Subscription,
    external_id: Option<String>,
    gateway_id: Option<GatewayId>,
    now: Timestamp,
) -> Result<(Invoice, Subscription), LifecycleError> {
    let membership = services.load_membership(&subscription.membership_id).await?;
    let expected_status = subscription.status;
    if let Some(gateway_id) = gateway_id {
        subscription.gateway_id = Some(gateway_id);
    }

    let mut trial_member = None;
    let transition = if invoice.trial {
        let mut member = services.load_or_create_member(&subscription.member_id).await?;
        if !member.record_trial(membership.id) {
            return Err(LifecycleError::invalid_state(format!(
                "Member {} already had a trial of '{}'",
                member.id, membership.name
            )));
        }
        trial_member = Some(member);
        subscription.start_trial(now.add_period(membership.trial.period), now)?
    } else {
        let start = paid_period_start(&subscription, now);
        subscription.activate(membership.pricing.access_end(start), now)?
    };
    let unclaimed = invoice.clone();
    let settled = invoice.mark_paid(external_id, now)?;

    services
        .invoices
        .save_if_status(&invoice, InvoiceStatus::Pending)
        .await?;
    let stored = match services.commit(&subscription, expected_status).await {
        Ok(stored) => stored,
        Err(e) => {
            release_claim(services, &unclaimed).await;
            return Err(e);
        }
    };
    if let Some(member) = trial_member {
        services.members.save(&member).await?;
    }

    info!(
        subscription_id = %stored.id,
        invoice_id = %invoice.id,
        old_status = %transition.old_status,
        new_status = %transition.new_status,
        expire_date = ?stored.expire_date,
        "Invoice settled"
    );

    let mut events = PendingEvents::for_member(&stored.member_id);
    events.push(&transition);
    events.push(&settled);
    services.publish(events).await;

    Ok((invoice, stored))
}

/// Charges a pending invoice and settles it on success.
///
/// Zero-total invoices are settled without contacting any gateway.
pub(crate) async fn charge_invoice(
    services: &BillingServices,
    mut invoice: Invoice,
    subscription: Subscription,
    gateway_override: Option<GatewayId>,
    payment: PaymentDetails,
    now: Timestamp,
) -> Result<PurchaseOutcome, LifecycleError> {
    if !invoice.is_pending() {
        return Err(LifecycleError::invalid_state(format!(
            "Invoice #{} is {}",
            invoice.number,
            invoice.status()
        )));
    }
    if invoice.subscription_id != subscription.id {
        return Err(LifecycleError::validation(format!(
            "Invoice #{} does not belong to subscription {}",
            invoice.number, subscription.id
        )));
    }
    if let Some(external_id) = invoice.external_id() {
        return Err(LifecycleError::invalid_state(format!(
            "Invoice #{} is awaiting confirmation of transaction {}",
            invoice.number, external_id
        )));
    }
    if !subscription.is_current() {
        return Err(LifecycleError::invalid_state(format!(
            "Subscription {} is {}",
            subscription.id, subscription.status
        )));
    }
    if invoice.trial {
        ensure_trial_applicable(services, &invoice, &subscription).await?;
    }

    // 1. Free purchases bypass gateways entirely.
    if invoice.is_zero_total() {
        invoice.set_gateway(GatewayId::known(FREE_GATEWAY_ID))?;
        let (invoice, subscription) =
            settle_paid(services, invoice, subscription, None, None, now).await?;
        return Ok(PurchaseOutcome::Paid {
            invoice,
            subscription,
        });
    }

    // 2. Resolve and check the gateway before anything is charged.
    let gateway_id = gateway_override
        .or_else(|| invoice.gateway_id.clone())
        .or_else(|| subscription.gateway_id.clone())
        .ok_or_else(|| LifecycleError::validation("No payment gateway selected"))?;
    let gateway = services
        .gateways
        .get(&gateway_id)
        .ok_or_else(|| LifecycleError::configuration(gateway_id.as_str(), "unknown gateway"))?;
    if !gateway.is_configured() {
        return Err(LifecycleError::configuration(
            gateway_id.as_str(),
            "gateway is not configured",
        ));
    }

    let details = if payment.token.is_some() {
        payment.clone()
    } else {
        let member = services.load_or_create_member(&subscription.member_id).await?;
        member
            .profile(&gateway_id)
            .map(PaymentDetails::from_profile)
            .unwrap_or_else(|| payment.clone())
    };
    if gateway.requires_token() && details.token.is_none() {
        return Err(LifecycleError::validation(format!(
            "Gateway '{}' requires a payment token",
            gateway_id
        )));
    }

    invoice.set_gateway(gateway_id.clone())?;
    services
        .invoices
        .save_if_status(&invoice, InvoiceStatus::Pending)
        .await?;

    // 3. Charge. A timeout is never treated as a payment.
    let timeout = services.billing.gateway_timeout();
    let result = match tokio::time::timeout(timeout, gateway.charge(&invoice, &details)).await {
        Ok(result) => result,
        Err(_) => ChargeResult::Transient {
            reason: format!("no answer within {}s", timeout.as_secs()),
        },
    };

    // 4. Apply the outcome.
    match result {
        ChargeResult::Succeeded { transaction_id } => {
            let invoice_id = invoice.id;
            match settle_paid(
                services,
                invoice,
                subscription,
                Some(transaction_id.clone()),
                Some(gateway_id.clone()),
                now,
            )
            .await
            {
                Ok((invoice, subscription)) => {
                    if payment.save_profile {
                        store_profile(services, &subscription, &gateway_id, &details).await;
                    }
                    Ok(PurchaseOutcome::Paid {
                        invoice,
                        subscription,
                    })
                }
                Err(e) => {
                    record_unapplied_charge(services, &invoice_id, &transaction_id, &e).await;
                    Err(e)
                }
            }
        }
        ChargeResult::Pending { transaction_id } => {
            invoice.record_external_id(transaction_id.clone())?;
            services
                .invoices
                .save_if_status(&invoice, InvoiceStatus::Pending)
                .await?;
            info!(
                invoice_id = %invoice.id,
                gateway_id = %gateway_id,
                transaction_id = %transaction_id,
                "Charge awaiting confirmation"
            );
            Ok(PurchaseOutcome::AwaitingConfirmation {
                invoice,
                subscription,
            })
        }
        ChargeResult::Declined { reason } => {
            warn!(
                invoice_id = %invoice.id,
                gateway_id = %gateway_id,
                reason = %reason,
                "Charge declined"
            );
            fail_invoice(services, &invoice.id, &subscription, &reason, now).await?;
            Err(LifecycleError::GatewayDeclined {
                invoice_id: invoice.id,
                reason,
            })
        }
        ChargeResult::Transient { reason } => {
            warn!(
                invoice_id = %invoice.id,
                gateway_id = %gateway_id,
                reason = %reason,
                "Charge failed transiently; invoice left pending"
            );
            Err(LifecycleError::GatewayTransient {
                invoice_id: invoice.id,
                reason,
            })
        }
    }
}

/// Marks an invoice failed if it is still pending.
pub(crate) async fn fail_invoice(
    services: &BillingServices,
    invoice_id: &InvoiceId,
    subscription: &Subscription,
    reason: &str,
    now: Timestamp,
) -> Result<Option<Invoice>, LifecycleError> {
    let mut invoice = services.load_invoice(invoice_id).await?;
    if !invoice.is_pending() {
        warn!(
            invoice_id = %invoice.id,
            status = %invoice.status(),
            "Invoice settled elsewhere; not marking failed"
        );
        return Ok(None);
    }

    let settled = invoice.mark_failed(reason, now)?;
    match services
        .invoices
        .save_if_status(&invoice, InvoiceStatus::Pending)
        .await
    {
        Ok(()) => {}
        Err(e) if e.code == ErrorCode::ConcurrencyConflict => {
            warn!(invoice_id = %invoice.id, "Invoice settled concurrently; not marking failed");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    let mut events = PendingEvents::for_member(&subscription.member_id);
    events.push(&settled);
    services.publish(events).await;

    Ok(Some(invoice))
}

/// A trial invoice only starts a trial: the subscription must still be
/// pending and the member must not have used this plan's trial.
async fn ensure_trial_applicable(
    services: &BillingServices,
    invoice: &Invoice,
    subscription: &Subscription,
) -> Result<(), LifecycleError> {
    if subscription.status != SubscriptionStatus::Pending {
        return Err(LifecycleError::invalid_state(format!(
            "Trial invoice #{} cannot be paid: subscription {} is {}",
            invoice.number, subscription.id, subscription.status
        )));
    }
    let member = services.load_or_create_member(&subscription.member_id).await?;
    if member.has_used_trial(&invoice.membership_id) {
        return Err(LifecycleError::invalid_state(format!(
            "Trial invoice #{} cannot be paid: member {} already had this trial",
            invoice.number, member.id
        )));
    }
    Ok(())
}

/// Puts a claimed invoice back to pending after the subscription commit failed.
async fn release_claim(services: &BillingServices, unclaimed: &Invoice) {
    if let Err(e) = services
        .invoices
        .save_if_status(unclaimed, InvoiceStatus::Paid)
        .await
    {
        warn!(invoice_id = %unclaimed.id, error = %e, "Failed to release invoice claim");
    }
}

/// Keeps a trace of a successful charge whose settlement failed, so it can
/// be refunded or reconciled.
async fn record_unapplied_charge(
    services: &BillingServices,
    invoice_id: &InvoiceId,
    transaction_id: &str,
    cause: &LifecycleError,
) {
    warn!(
        invoice_id = %invoice_id,
        transaction_id = %transaction_id,
        error = %cause,
        "Charge succeeded but was not applied; needs reconciliation"
    );

    let result = async {
        let mut invoice = services.load_invoice(invoice_id).await?;
        if invoice.is_pending() {
            invoice.record_external_id(transaction_id)?;
            invoice.add_note(format!(
                "Charge {} succeeded but was not applied: {}",
                transaction_id, cause
            ))?;
            services
                .invoices
                .save_if_status(&invoice, InvoiceStatus::Pending)
                .await?;
        }
        Ok::<_, LifecycleError>(())
    }
    .await;

    if let Err(e) = result {
        warn!(invoice_id = %invoice_id, error = %e, "Failed to annotate unapplied charge");
    }
}

async fn store_profile(
    services: &BillingServices,
    subscription: &Subscription,
    gateway_id: &GatewayId,
    details: &PaymentDetails,
) {
    let Some(token) = &details.token else {
        return;
    };

    let result = async {
        let mut member = services.load_or_create_member(&subscription.member_id).await?;
        member.store_profile(gateway_id.clone(), PaymentProfile::new(token.clone())?);
        member.attach_subscription(subscription.id);
        services.members.save(&member).await?;
        Ok::<_, LifecycleError>(())
    }
    .await;

    if let Err(e) = result {
        warn!(member_id = %subscription.member_id, error = %e, "Failed to store payment profile");
    }
}
