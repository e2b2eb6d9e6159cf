//! Invoice aggregate.
//!
//! An invoice is a lifecycle marker for one billable event of a subscription,
//! not an accounting record.
//!
//! # Design Decisions
//!
//! - **Derived total**: `total_cents` is private and recomputed whenever a
//!   component changes; there is no setter
//! - **Immutable once paid**: only the refund annotation may follow `Paid`
//! - **Money in cents**: all amounts are i64 minor units

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, EventId, GatewayId, InvoiceId, MemberId, MembershipId, StateMachine,
    SubscriptionId, Timestamp,
};

use super::{InvoiceSettled, InvoiceStatus};

/// Named tax rate in basis points (1/100 of a percent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    pub name: String,
    pub rate_bps: u32,
}

/// One billable event of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,

    pub subscription_id: SubscriptionId,

    pub member_id: MemberId,

    pub membership_id: MembershipId,

    /// Monotonic per installation.
    pub number: u64,

    pub gateway_id: Option<GatewayId>,

    status: InvoiceStatus,

    /// ISO-4217 code.
    pub currency: String,

    amount_cents: i64,

    discount_cents: i64,

    pro_rate_cents: i64,

    tax: Option<TaxLine>,

    tax_cents: i64,

    total_cents: i64,

    coupon_code: Option<String>,

    pub due_date: Timestamp,

    /// Bills a trial rather than a full period.
    pub trial: bool,

    notes: Vec<String>,

    /// Gateway transaction id, set once a charge is submitted.
    external_id: Option<String>,

    paid_at: Option<Timestamp>,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,
}

impl Invoice {
    /// Creates a pending invoice for a base amount.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscription_id: SubscriptionId,
        member_id: MemberId,
        membership_id: MembershipId,
        number: u64,
        currency: impl Into<String>,
        amount_cents: i64,
        due_date: Timestamp,
        trial: bool,
    ) -> Result<Self, DomainError> {
        if amount_cents < 0 {
            return Err(DomainError::validation("amount_cents", "Invoice amount cannot be negative"));
        }
        let now = Timestamp::now();
        let mut invoice = Self {
            id: InvoiceId::new(),
            subscription_id,
            member_id,
            membership_id,
            number,
            gateway_id: None,
            status: InvoiceStatus::Pending,
            currency: currency.into(),
            amount_cents,
            discount_cents: 0,
            pro_rate_cents: 0,
            tax: None,
            tax_cents: 0,
            total_cents: 0,
            coupon_code: None,
            due_date,
            trial,
            notes: Vec::new(),
            external_id: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        invoice.recompute_total();
        Ok(invoice)
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    pub fn discount_cents(&self) -> i64 {
        self.discount_cents
    }

    pub fn pro_rate_cents(&self) -> i64 {
        self.pro_rate_cents
    }

    pub fn tax(&self) -> Option<&TaxLine> {
        self.tax.as_ref()
    }

    pub fn tax_cents(&self) -> i64 {
        self.tax_cents
    }

    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn paid_at(&self) -> Option<Timestamp> {
        self.paid_at
    }

    pub fn is_zero_total(&self) -> bool {
        self.total_cents == 0
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Pending
    }

    /// Applies a discount, clamped to the base amount.
    pub fn apply_discount(&mut self, cents: i64, coupon_code: Option<String>) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.discount_cents = cents.clamp(0, self.amount_cents);
        self.coupon_code = coupon_code;
        self.recompute_total();
        Ok(())
    }

    /// Applies a pro-rated credit.
    pub fn apply_pro_rate(&mut self, cents: i64) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.pro_rate_cents = cents.max(0);
        self.recompute_total();
        Ok(())
    }

    pub fn apply_tax(&mut self, tax: Option<TaxLine>) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.tax = tax;
        self.recompute_total();
        Ok(())
    }

    pub fn set_gateway(&mut self, gateway_id: GatewayId) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.gateway_id = Some(gateway_id);
        Ok(())
    }

    /// Records the gateway's transaction id for a charge still awaiting settlement.
    pub fn record_external_id(&mut self, external_id: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.external_id = Some(external_id.into());
        self.updated_at = Timestamp::now();
        Ok(())
    }

    pub fn add_note(&mut self, note: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.notes.push(note.into());
        Ok(())
    }

    pub fn mark_paid(
        &mut self,
        external_id: Option<String>,
        now: Timestamp,
    ) -> Result<InvoiceSettled, DomainError> {
        self.transition(InvoiceStatus::Paid, now)?;
        if external_id.is_some() {
            self.external_id = external_id;
        }
        self.paid_at = Some(now);
        Ok(self.settled_event(now))
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<InvoiceSettled, DomainError> {
        self.transition(InvoiceStatus::Failed, now)?;
        self.notes.push(reason.into());
        Ok(self.settled_event(now))
    }

    /// Annotates a paid invoice as refunded. The only mutation allowed after payment.
    pub fn mark_refunded(&mut self, note: Option<String>, now: Timestamp) -> Result<InvoiceSettled, DomainError> {
        self.transition(InvoiceStatus::Refunded, now)?;
        if let Some(note) = note {
            self.notes.push(note);
        }
        Ok(self.settled_event(now))
    }

    fn transition(&mut self, target: InvoiceStatus, now: Timestamp) -> Result<(), DomainError> {
        if !self.status.can_transition_to(&target) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition invoice from {} to {}", self.status, target),
            )
            .with_detail("invoice_id", self.id.to_string()));
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), DomainError> {
        if self.status != InvoiceStatus::Pending {
            return Err(DomainError::new(
                ErrorCode::InvoiceImmutable,
                format!("Invoice #{} is {} and cannot be modified", self.number, self.status),
            )
            .with_detail("invoice_id", self.id.to_string()));
        }
        Ok(())
    }

    fn recompute_total(&mut self) {
        let taxable = self
            .amount_cents
            .saturating_sub(self.discount_cents)
            .saturating_sub(self.pro_rate_cents)
            .max(0);
        self.tax_cents = self
            .tax
            .as_ref()
            .map(|t| tax_on(taxable, t.rate_bps))
            .unwrap_or(0);
        self.total_cents = taxable.saturating_add(self.tax_cents);
        self.updated_at = Timestamp::now();
    }

    fn settled_event(&self, now: Timestamp) -> InvoiceSettled {
        InvoiceSettled {
            event_id: EventId::new(),
            invoice_id: self.id,
            subscription_id: self.subscription_id,
            invoice_number: self.number,
            status: self.status,
            total_cents: self.total_cents,
            external_id: self.external_id.clone(),
            occurred_at: now,
        }
    }
}

/// Round-half-up tax in cents.
/// Rounds half up. Widened so large amounts saturate instead of overflowing.
fn tax_on(taxable_cents: i64, rate_bps: u32) -> i64 {
    let tax = (i128::from(taxable_cents) * i128::from(rate_bps) + 5_000) / 10_000;
    i64::try_from(tax).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(amount: i64) -> Invoice {
        Invoice::new(
            SubscriptionId::new(),
            MemberId::new("member-1").unwrap(),
            MembershipId::new(),
            1,
            "USD",
            amount,
            Timestamp::now(),
            false,
        )
        .unwrap()
    }

    fn vat(bps: u32) -> Option<TaxLine> {
        Some(TaxLine {
            name: "VAT".into(),
            rate_bps: bps,
        })
    }

    #[test]
    fn total_follows_components() {
        let mut inv = invoice(10_000);
        assert_eq!(inv.total_cents(), 10_000);

        inv.apply_discount(1_500, Some("SPRING".into())).unwrap();
        inv.apply_pro_rate(500).unwrap();
        inv.apply_tax(vat(2_000)).unwrap();

        // taxable 8000, tax 1600
        assert_eq!(inv.tax_cents(), 1_600);
        assert_eq!(inv.total_cents(), 9_600);
        assert_eq!(
            inv.total_cents(),
            inv.amount_cents() - inv.discount_cents() - inv.pro_rate_cents() + inv.tax_cents()
        );
    }

    #[test]
    fn tax_rounds_half_up() {
        let mut inv = invoice(1_005);
        inv.apply_tax(vat(1_000)).unwrap();
        // 100.5 cents
        assert_eq!(inv.tax_cents(), 101);
    }

    #[test]
    fn discount_is_clamped_to_amount() {
        let mut inv = invoice(1_000);
        inv.apply_discount(5_000, None).unwrap();
        assert_eq!(inv.discount_cents(), 1_000);
        assert!(inv.is_zero_total());
    }

    #[test]
    fn negative_amount_is_rejected() {
        assert!(Invoice::new(
            SubscriptionId::new(),
            MemberId::new("m").unwrap(),
            MembershipId::new(),
            1,
            "USD",
            -1,
            Timestamp::now(),
            false
        )
        .is_err());
    }

    #[test]
    fn paid_invoice_rejects_mutation_but_accepts_refund() {
        let mut inv = invoice(1_000);
        let event = inv.mark_paid(Some("txn_1".into()), Timestamp::now()).unwrap();
        assert_eq!(event.status, InvoiceStatus::Paid);
        assert_eq!(inv.external_id(), Some("txn_1"));

        assert_eq!(inv.apply_discount(100, None).unwrap_err().code, ErrorCode::InvoiceImmutable);
        assert!(inv.add_note("late note").is_err());
        assert!(inv.mark_paid(None, Timestamp::now()).is_err());

        inv.mark_refunded(Some("customer request".into()), Timestamp::now()).unwrap();
        assert_eq!(inv.status(), InvoiceStatus::Refunded);
        assert_eq!(inv.total_cents(), 1_000);
    }

    #[test]
    fn failed_invoice_keeps_reason_and_is_final() {
        let mut inv = invoice(1_000);
        inv.mark_failed("card declined", Timestamp::now()).unwrap();
        assert_eq!(inv.notes(), &["card declined".to_string()]);
        assert!(inv.mark_paid(None, Timestamp::now()).is_err());
    }

    #[test]
    fn mark_paid_without_external_id_keeps_recorded_one() {
        let mut inv = invoice(1_000);
        inv.record_external_id("txn_async").unwrap();
        inv.mark_paid(None, Timestamp::now()).unwrap();
        assert_eq!(inv.external_id(), Some("txn_async"));
    }

    #[test]
    fn tax_on_huge_amount_saturates_instead_of_overflowing() {
        let mut inv = invoice(i64::MAX / 2);
        inv.apply_tax(vat(10_000)).unwrap();
        assert_eq!(inv.tax_cents(), i64::MAX / 2);
        assert_eq!(inv.total_cents(), i64::MAX - 1);

        let mut inv = invoice(i64::MAX);
        inv.apply_tax(vat(25_000)).unwrap();
        assert_eq!(inv.tax_cents(), i64::MAX);
        assert_eq!(inv.total_cents(), i64::MAX);
    }
}
