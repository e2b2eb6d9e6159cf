//! Membership plan entity.
//!
//! A Membership is a purchasable or grantable plan: pricing, trial terms and
//! one RuleSet per rule type. Plans are shared read-only by the subscriptions
//! that reference them.
//!
//! # Design Decisions
//!
//! - **Money in cents**: prices are i64 minor units
//! - **Reserved plans**: the base protected-content plan and the guest plan
//!   are `special`; they cannot be purchased or deleted
//! - **Closed rule types**: rule sets are keyed by the `RuleType` enum

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::access::{RuleSet, RuleType};
use crate::domain::foundation::{DomainError, ErrorCode, MembershipId, Timestamp};

use super::{PricingMode, TrialTerms};

/// Structural kind of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipKind {
    Simple,
    /// Inherits rules from a parent plan; merge is deny-wins.
    TieredChild { parent: MembershipId },
    Dripped,
}

/// Reserved system plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialMembership {
    /// Rules that apply to every member regardless of subscription.
    BaseProtectedContent,
    Guest,
}

/// Membership plan.
///
/// # Invariants
///
/// - `name` is non-empty, `price_cents >= 0`
/// - Every rule set is owned by this plan (`rule_set.membership_id == id`)
/// - A `Free` plan always prices at zero
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,

    pub name: String,

    pub kind: MembershipKind,

    pub pricing: PricingMode,

    /// Price per payment in minor units.
    price_cents: i64,

    pub trial: TrialTerms,

    pub special: Option<SpecialMembership>,

    /// Inactive plans cannot be subscribed to.
    pub active: bool,

    /// Private plans are hidden from listings but still purchasable by link.
    pub private: bool,

    rule_sets: BTreeMap<RuleType, RuleSet>,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,
}

impl Membership {
    /// Creates an active simple plan.
    pub fn new(
        name: impl Into<String>,
        pricing: PricingMode,
        price_cents: i64,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "Membership name cannot be empty"));
        }
        if price_cents < 0 {
            return Err(DomainError::validation("price_cents", "Price cannot be negative"));
        }
        pricing.validate()?;

        let now = Timestamp::now();
        Ok(Self {
            id: MembershipId::new(),
            name,
            kind: MembershipKind::Simple,
            pricing,
            price_cents: if pricing.is_free() { 0 } else { price_cents },
            trial: TrialTerms::disabled(),
            special: None,
            active: true,
            private: false,
            rule_sets: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// The single plan whose rules apply to everyone.
    pub fn base_protected_content() -> Self {
        Self::reserved("Protected Content", SpecialMembership::BaseProtectedContent)
    }

    pub fn guest() -> Self {
        Self::reserved("Guest", SpecialMembership::Guest)
    }

    fn reserved(name: &str, special: SpecialMembership) -> Self {
        let now = Timestamp::now();
        Self {
            id: MembershipId::new(),
            name: name.to_string(),
            kind: MembershipKind::Simple,
            pricing: PricingMode::Free,
            price_cents: 0,
            trial: TrialTerms::disabled(),
            special: Some(special),
            active: true,
            private: true,
            rule_sets: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: MembershipId) -> Self {
        self.id = id;
        for set in self.rule_sets.values_mut() {
            set.membership_id = id;
        }
        self
    }

    pub fn with_trial(mut self, trial: TrialTerms) -> Self {
        self.trial = trial;
        self
    }

    pub fn with_parent(mut self, parent: MembershipId) -> Self {
        self.kind = MembershipKind::TieredChild { parent };
        self
    }

    pub fn with_kind(mut self, kind: MembershipKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn price_cents(&self) -> i64 {
        if self.pricing.is_free() {
            0
        } else {
            self.price_cents
        }
    }

    pub fn is_special(&self) -> bool {
        self.special.is_some()
    }

    pub fn is_base(&self) -> bool {
        self.special == Some(SpecialMembership::BaseProtectedContent)
    }

    /// True if the plan can go through the normal purchase flow.
    pub fn is_purchasable(&self) -> bool {
        self.active && !self.is_special()
    }

    pub fn has_trial(&self) -> bool {
        self.trial.enabled
    }

    pub fn parent(&self) -> Option<MembershipId> {
        match self.kind {
            MembershipKind::TieredChild { parent } => Some(parent),
            _ => None,
        }
    }

    /// Installs a rule set, taking ownership of it.
    pub fn set_rule_set(&mut self, mut rule_set: RuleSet) {
        rule_set.membership_id = self.id;
        self.rule_sets.insert(rule_set.rule_type, rule_set);
        self.updated_at = Timestamp::now();
    }

    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.set_rule_set(rule_set);
        self
    }

    /// Returns the plan's own rules for a type, or an empty set with the
    /// type's default policy.
    pub fn rule_set(&self, rule_type: RuleType) -> RuleSet {
        self.rule_sets
            .get(&rule_type)
            .cloned()
            .unwrap_or_else(|| RuleSet::new(self.id, rule_type))
    }

    pub fn rule_sets(&self) -> impl Iterator<Item = &RuleSet> {
        self.rule_sets.values()
    }

    /// Rejects deletion of reserved plans.
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.is_special() {
            return Err(DomainError::new(
                ErrorCode::SpecialMembership,
                format!("Membership '{}' is reserved and cannot be deleted", self.name),
            )
            .with_detail("membership_id", self.id.to_string()));
        }
        Ok(())
    }
}
