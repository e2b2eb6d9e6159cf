//! Discount calculation extension point.
//!
//! Invoice creation asks a `DiscountCalculator` for the discount to apply.
//! `CouponBook` is the bundled implementation; `NoDiscount` is the default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::domain::foundation::{DomainError, MembershipId, Percentage};
use crate::domain::membership::Membership;

/// Discount granted on one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppliedDiscount {
    pub coupon_code: Option<String>,
    pub amount_cents: i64,
}

impl AppliedDiscount {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Pluggable discount policy.
pub trait DiscountCalculator: Send + Sync {
    /// Computes (and, for capped coupons, redeems) the discount for a charge.
    ///
    /// An unknown or unusable code is a validation error, so the purchase is
    /// rejected before any invoice exists.
    fn apply(
        &self,
        membership: &Membership,
        amount_cents: i64,
        coupon_code: Option<&str>,
    ) -> Result<AppliedDiscount, DomainError>;
}

/// Applies no discounts and rejects any coupon code.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscount;

impl DiscountCalculator for NoDiscount {
    fn apply(
        &self,
        _membership: &Membership,
        _amount_cents: i64,
        coupon_code: Option<&str>,
    ) -> Result<AppliedDiscount, DomainError> {
        match coupon_code {
            Some(code) => Err(DomainError::validation("coupon_code", format!("Unknown coupon '{}'", code))),
            None => Ok(AppliedDiscount::none()),
        }
    }
}

/// How much a coupon takes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponValue {
    Percent { percent: Percentage },
    Fixed { cents: i64 },
}

/// A redeemable coupon.
#[derive(Debug)]
pub struct Coupon {
    pub code: String,
    pub value: CouponValue,
    /// Plans the coupon is valid for; empty means all plans.
    pub membership_ids: Vec<MembershipId>,
    pub max_uses: Option<u32>,
    uses: AtomicU32,
}

impl Coupon {
    pub fn new(code: impl Into<String>, value: CouponValue) -> Self {
        Self {
            code: code.into(),
            value,
            membership_ids: Vec::new(),
            max_uses: None,
            uses: AtomicU32::new(0),
        }
    }

    pub fn restricted_to(mut self, membership_id: MembershipId) -> Self {
        self.membership_ids.push(membership_id);
        self
    }

    pub fn with_max_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    pub fn uses(&self) -> u32 {
        self.uses.load(Ordering::SeqCst)
    }

    fn discount_on(&self, amount_cents: i64) -> i64 {
        let raw = match self.value {
            CouponValue::Percent { percent } => percent.apply_to_cents(amount_cents),
            CouponValue::Fixed { cents } => cents,
        };
        raw.clamp(0, amount_cents.max(0))
    }

    /// Claims one use, failing once the cap is reached.
    fn try_redeem(&self) -> bool {
        match self.max_uses {
            None => {
                self.uses.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(max) => self
                .uses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    (used < max).then_some(used + 1)
                })
                .is_ok(),
        }
    }
}

/// Coupon codes known to the installation, matched case-insensitively.
#[derive(Debug, Default)]
pub struct CouponBook {
    coupons: HashMap<String, Coupon>,
}

impl CouponBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.coupons.insert(coupon.code.to_ascii_uppercase(), coupon);
        self
    }

    pub fn get(&self, code: &str) -> Option<&Coupon> {
        self.coupons.get(&code.trim().to_ascii_uppercase())
    }
}

impl DiscountCalculator for CouponBook {
    fn apply(
        &self,
        membership: &Membership,
        amount_cents: i64,
        coupon_code: Option<&str>,
    ) -> Result<AppliedDiscount, DomainError> {
        let Some(code) = coupon_code else {
            return Ok(AppliedDiscount::none());
        };

        let coupon = self
            .get(code)
            .ok_or_else(|| DomainError::validation("coupon_code", format!("Unknown coupon '{}'", code)))?;

        if !coupon.membership_ids.is_empty() && !coupon.membership_ids.contains(&membership.id) {
            return Err(DomainError::validation(
                "coupon_code",
                format!("Coupon '{}' is not valid for {}", coupon.code, membership.name),
            ));
        }

        if !coupon.try_redeem() {
            return Err(DomainError::validation(
                "coupon_code",
                format!("Coupon '{}' has been fully redeemed", coupon.code),
            ));
        }

        Ok(AppliedDiscount {
            coupon_code: Some(coupon.code.clone()),
            amount_cents: coupon.discount_on(amount_cents),
        })
    }
}
