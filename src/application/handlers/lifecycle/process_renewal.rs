//! ProcessRenewalHandler - Command handler for the periodic renewal trigger.
//!
//! The engine runs no scheduler. An external trigger finds due subscriptions
//! (`SubscriptionRepository::find_due`) and calls this handler once per
//! subscription with an explicit `as_of`, or hands the whole batch to
//! `run_due`.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::domain::membership::Membership;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::PaymentDetails;

use super::invoicing::{issue_invoice, period_end, InvoiceAdjustments, InvoicePurpose};
use super::services::PendingEvents;
use super::settlement::charge_invoice;
use super::{BillingServices, LifecycleError, PurchaseOutcome};

/// Command to process one subscription's renewal.
#[derive(Debug, Clone)]
pub struct ProcessRenewalCommand {
    pub subscription_id: SubscriptionId,
    pub as_of: Timestamp,
}

impl ProcessRenewalCommand {
    pub fn new(subscription_id: SubscriptionId, as_of: Timestamp) -> Self {
        Self {
            subscription_id,
            as_of,
        }
    }
}

/// What the renewal run did.
#[derive(Debug, Clone)]
pub enum RenewalOutcome {
    /// Nothing is due yet, or nothing applies (terminal, perpetual).
    NotDue,
    /// Trial of a free plan converted without billing.
    TrialConverted { subscription: Subscription },
    /// Auto-charged through the stored payment profile.
    Renewed {
        invoice: Invoice,
        subscription: Subscription,
    },
    /// Auto-charge accepted; settlement will arrive as a confirmation.
    AwaitingConfirmation { invoice: Invoice },
    /// Renewal invoice left unpaid; the subscription is in grace.
    GraceEntered {
        invoice: Invoice,
        subscription: Subscription,
        /// Why it was not charged, if an attempt was made.
        charge_error: Option<LifecycleError>,
    },
    /// Grace elapsed, a one-off period ended, or a date range closed.
    Expired { subscription: Subscription },
}

/// Summary of a `run_due` batch.
#[derive(Debug, Default)]
pub struct RenewalRun {
    pub outcomes: Vec<(SubscriptionId, RenewalOutcome)>,
    pub failures: Vec<(SubscriptionId, LifecycleError)>,
}

impl RenewalRun {
    pub fn processed(&self) -> usize {
        self.outcomes.len() + self.failures.len()
    }
}

/// Handler for renewals.
///
/// | Status | Due when | Action |
/// |--------|----------|--------|
/// | trial | trial end | free plan: activate; otherwise bill |
/// | active, recurring | expire date | bill |
/// | active, one-off | expire date | expire |
/// | pending in grace | grace deadline | expire |
///
/// "Bill" creates at most one renewal invoice per period, then charges the
/// stored profile when the gateway supports recurring billing. Otherwise
/// the invoice is left for the member to pay (prompt) and the subscription
/// enters grace.
pub struct ProcessRenewalHandler {
    services: BillingServices,
}

impl ProcessRenewalHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    pub async fn handle(
        &self,
        cmd: ProcessRenewalCommand,
    ) -> Result<RenewalOutcome, LifecycleError> {
        let subscription = self.services.load_subscription(&cmd.subscription_id).await?;
        if !subscription.is_current() {
            return Ok(RenewalOutcome::NotDue);
        }
        let now = cmd.as_of;

        match subscription.status {
            SubscriptionStatus::Pending => match subscription.grace_until {
                Some(deadline) if !now.is_before(&deadline) => self.expire(subscription, now).await,
                _ => Ok(RenewalOutcome::NotDue),
            },
            SubscriptionStatus::Trial | SubscriptionStatus::Active => {
                let Some(boundary) = period_end(&subscription) else {
                    return Ok(RenewalOutcome::NotDue);
                };
                if now.is_before(&boundary) {
                    return Ok(RenewalOutcome::NotDue);
                }

                let membership = self.services.load_membership(&subscription.membership_id).await?;
                if subscription.status == SubscriptionStatus::Trial && membership.price_cents() == 0 {
                    return self.convert_free_trial(subscription, &membership, boundary, now).await;
                }
                if subscription.status == SubscriptionStatus::Active
                    && !membership.pricing.is_recurring()
                {
                    return self.expire(subscription, now).await;
                }
                self.bill(subscription, &membership, boundary, now).await
            }
            SubscriptionStatus::Expired | SubscriptionStatus::Cancelled => Ok(RenewalOutcome::NotDue),
        }
    }

    /// Processes every due subscription, up to `concurrency` at a time.
    ///
    /// Distinct subscriptions never contend, so they run concurrently. One
    /// subscription failing does not stop the others.
    pub async fn run_due(
        &self,
        as_of: Timestamp,
        concurrency: usize,
    ) -> Result<RenewalRun, LifecycleError> {
        let due = self.services.subscriptions.find_due(as_of).await?;
        let total = due.len();

        let results: Vec<_> = stream::iter(due)
            .map(|subscription| async move {
                let id = subscription.id;
                (id, self.handle(ProcessRenewalCommand::new(id, as_of)).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut run = RenewalRun::default();
        for (id, result) in results {
            match result {
                Ok(outcome) => run.outcomes.push((id, outcome)),
                Err(e) => {
                    warn!(subscription_id = %id, error = %e, "Renewal failed");
                    run.failures.push((id, e));
                }
            }
        }

        info!(
            as_of = %as_of,
            due = total,
            failed = run.failures.len(),
            "Renewal run finished"
        );
        Ok(run)
    }

    async fn convert_free_trial(
        &self,
        mut subscription: Subscription,
        membership: &Membership,
        trial_end: Timestamp,
        now: Timestamp,
    ) -> Result<RenewalOutcome, LifecycleError> {
        let expected = subscription.status;
        let event = subscription.activate(membership.pricing.access_end(trial_end), now)?;
        let stored = self.services.commit(&subscription, expected).await?;

        info!(subscription_id = %stored.id, "Free trial converted");
        let mut events = PendingEvents::for_member(&stored.member_id);
        events.push(&event);
        self.services.publish(events).await;

        Ok(RenewalOutcome::TrialConverted {
            subscription: stored,
        })
    }

    async fn expire(
        &self,
        mut subscription: Subscription,
        now: Timestamp,
    ) -> Result<RenewalOutcome, LifecycleError> {
        let expected = subscription.status;
        let event = subscription.expire(now)?;
        let stored = self.services.commit(&subscription, expected).await?;

        info!(subscription_id = %stored.id, from = %expected, "Subscription expired");
        let mut events = PendingEvents::for_member(&stored.member_id);
        events.push(&event);
        self.services.publish(events).await;

        Ok(RenewalOutcome::Expired {
            subscription: stored,
        })
    }

    async fn bill(
        &self,
        subscription: Subscription,
        membership: &Membership,
        boundary: Timestamp,
        now: Timestamp,
    ) -> Result<RenewalOutcome, LifecycleError> {
        // 1. One renewal invoice per period
        let invoice = match self.outstanding_renewal(&subscription, boundary).await? {
            Some(invoice) => invoice,
            None => {
                issue_invoice(
                    &self.services,
                    &subscription,
                    membership,
                    InvoicePurpose::Renewal,
                    &InvoiceAdjustments::default(),
                    now,
                )
                .await?
            }
        };

        // 2. Auto-charge where the gateway can bill a stored profile
        let charge_error = match self.auto_charge_details(&subscription).await? {
            Some(details) => {
                match charge_invoice(
                    &self.services,
                    invoice.clone(),
                    subscription.clone(),
                    None,
                    details,
                    now,
                )
                .await
                {
                    Ok(PurchaseOutcome::Paid {
                        invoice,
                        subscription,
                    }) => {
                        return Ok(RenewalOutcome::Renewed {
                            invoice,
                            subscription,
                        })
                    }
                    Ok(PurchaseOutcome::AwaitingConfirmation { invoice, .. }) => {
                        return Ok(RenewalOutcome::AwaitingConfirmation { invoice })
                    }
                    Err(e) if e.is_concurrency_conflict() => return Err(e),
                    Err(e) => Some(e),
                }
            }
            None => None,
        };

        // 3. Unpaid at the due date: grace
        let mut subscription = subscription;
        let expected = subscription.status;
        let deadline = now.add_period(self.services.billing.grace_period());
        let event = subscription.enter_grace(deadline, now)?;
        let stored = self.services.commit(&subscription, expected).await?;

        match &charge_error {
            Some(e) => warn!(
                subscription_id = %stored.id,
                error = %e,
                grace_until = %deadline,
                "Renewal charge failed; grace entered"
            ),
            None => info!(
                subscription_id = %stored.id,
                invoice_id = %invoice.id,
                grace_until = %deadline,
                "Renewal invoice awaiting payment; grace entered"
            ),
        }

        let mut events = PendingEvents::for_member(&stored.member_id);
        events.push(&event);
        self.services.publish(events).await;

        let invoice = self.services.load_invoice(&invoice.id).await?;
        Ok(RenewalOutcome::GraceEntered {
            invoice,
            subscription: stored,
            charge_error,
        })
    }

    async fn outstanding_renewal(
        &self,
        subscription: &Subscription,
        boundary: Timestamp,
    ) -> Result<Option<Invoice>, LifecycleError> {
        Ok(self
            .services
            .invoices
            .find_by_subscription(&subscription.id)
            .await?
            .into_iter()
            .find(|i| i.status() == InvoiceStatus::Pending && !i.trial && i.due_date == boundary))
    }

    /// Stored profile on a configured, recurring-capable gateway.
    async fn auto_charge_details(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<PaymentDetails>, LifecycleError> {
        let Some(gateway_id) = &subscription.gateway_id else {
            return Ok(None);
        };
        let Some(gateway) = self.services.gateways.get(gateway_id) else {
            return Ok(None);
        };
        if !gateway.is_configured() || !gateway.supports_recurring() {
            return Ok(None);
        }

        let Some(member) = self.services.members.find_by_id(&subscription.member_id).await? else {
            return Ok(None);
        };
        Ok(member.profile(gateway_id).map(PaymentDetails::from_profile))
    }
}
