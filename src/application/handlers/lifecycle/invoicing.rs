//! Invoice issuing shared by subscribe, create-invoice and renewal.

use tracing::info;

use crate::domain::foundation::Timestamp;
use crate::domain::invoice::Invoice;
use crate::domain::membership::Membership;
use crate::domain::subscription::{Subscription, SubscriptionStatus};

use super::{BillingServices, LifecycleError};

/// What an invoice pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoicePurpose {
    /// First full payment of a new subscription.
    Initial,
    /// Trial price; paying it starts the trial.
    Trial,
    /// Next period of a running subscription, or an overdue one in grace.
    Renewal,
}

impl InvoicePurpose {
    /// Purpose of an invoice requested for a subscription in its current state.
    pub fn for_subscription(subscription: &Subscription) -> Self {
        match subscription.status {
            SubscriptionStatus::Pending if !subscription.in_grace() => InvoicePurpose::Initial,
            _ => InvoicePurpose::Renewal,
        }
    }
}

/// Pricing adjustments requested for a new invoice.
#[derive(Debug, Clone, Default)]
pub struct InvoiceAdjustments {
    pub coupon_code: Option<String>,
    pub pro_rate_cents: i64,
}

/// Creates and stores a pending invoice.
///
/// The amount comes from the plan (or its trial terms), then discount,
/// pro-rate credit and the configured tax are applied. Renewal invoices
/// fall due when the current paid period ends.
pub(crate) async fn issue_invoice(
    services: &BillingServices,
    subscription: &Subscription,
    membership: &Membership,
    purpose: InvoicePurpose,
    adjustments: &InvoiceAdjustments,
    now: Timestamp,
) -> Result<Invoice, LifecycleError> {
    let amount_cents = match purpose {
        InvoicePurpose::Trial => membership.trial.price_cents,
        InvoicePurpose::Initial | InvoicePurpose::Renewal => membership.price_cents(),
    };
    let due_date = match purpose {
        InvoicePurpose::Renewal => period_end(subscription).unwrap_or(now),
        InvoicePurpose::Initial | InvoicePurpose::Trial => now,
    };

    let discount = services.discounts.apply(
        membership,
        amount_cents,
        adjustments.coupon_code.as_deref(),
    )?;

    let number = services.invoices.next_invoice_number().await?;
    let mut invoice = Invoice::new(
        subscription.id,
        subscription.member_id.clone(),
        membership.id,
        number,
        services.billing.currency.clone(),
        amount_cents,
        due_date,
        purpose == InvoicePurpose::Trial,
    )?;
    invoice.apply_discount(discount.amount_cents, discount.coupon_code)?;
    invoice.apply_pro_rate(adjustments.pro_rate_cents)?;
    invoice.apply_tax(services.billing.tax_line())?;
    if let Some(gateway_id) = &subscription.gateway_id {
        invoice.set_gateway(gateway_id.clone())?;
    }

    services.invoices.save(&invoice).await?;

    info!(
        invoice_id = %invoice.id,
        invoice_number = invoice.number,
        subscription_id = %subscription.id,
        purpose = ?purpose,
        total_cents = invoice.total_cents(),
        "Invoice issued"
    );

    Ok(invoice)
}

/// End of the period currently paid for (or trialled).
pub(crate) fn period_end(subscription: &Subscription) -> Option<Timestamp> {
    match subscription.status {
        SubscriptionStatus::Trial => subscription.trial_end.or(subscription.expire_date),
        _ => subscription.expire_date,
    }
}

/// Where a newly paid period starts: renewals extend from the previous
/// end, trial conversions from the trial end.
pub(crate) fn paid_period_start(subscription: &Subscription, now: Timestamp) -> Timestamp {
    match subscription.status {
        SubscriptionStatus::Trial | SubscriptionStatus::Active => {
            period_end(subscription).unwrap_or(now)
        }
        SubscriptionStatus::Pending if subscription.in_grace() => {
            subscription.expire_date.unwrap_or(now)
        }
        _ => now,
    }
}
