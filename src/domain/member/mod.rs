//! Member entity.
//!
//! A member is the opaque host-system user plus what billing needs to know
//! about them: their subscriptions, their stored payment profiles and which
//! plans they have already trialled. Members are never deleted here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::domain::foundation::{
    DomainError, GatewayId, MemberId, MembershipId, SubscriptionId, Timestamp,
};

/// Tokenised payment reference stored per gateway. Never raw card data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProfile {
    /// Gateway-side customer or card token.
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_brand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,

    /// Expiry as `(month, year)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_expiry: Option<(u32, u32)>,
}

impl PaymentProfile {
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DomainError::validation("token", "Payment token cannot be empty"));
        }
        Ok(Self {
            token,
            card_brand: None,
            card_last4: None,
            card_expiry: None,
        })
    }

    pub fn with_card(
        mut self,
        brand: impl Into<String>,
        last4: impl Into<String>,
        expiry: (u32, u32),
    ) -> Result<Self, DomainError> {
        let last4 = last4.into();
        if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation("card_last4", "Expected the last four card digits"));
        }
        if !(1..=12).contains(&expiry.0) {
            return Err(DomainError::validation("card_expiry", "Expiry month must be 1-12"));
        }
        self.card_brand = Some(brand.into());
        self.card_last4 = Some(last4);
        self.card_expiry = Some(expiry);
        Ok(self)
    }
}

/// A member of the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,

    pub subscription_ids: Vec<SubscriptionId>,

    pub gateway_profiles: HashMap<GatewayId, PaymentProfile>,

    /// Plans this member has ever trialled. One trial per plan, ever.
    pub trial_history: BTreeSet<MembershipId>,

    pub created_at: Timestamp,
}

impl Member {
    pub fn new(id: MemberId) -> Self {
        Self {
            id,
            subscription_ids: Vec::new(),
            gateway_profiles: HashMap::new(),
            trial_history: BTreeSet::new(),
            created_at: Timestamp::now(),
        }
    }

    pub fn has_used_trial(&self, membership_id: &MembershipId) -> bool {
        self.trial_history.contains(membership_id)
    }

    /// Records a trial. Returns false if one was already recorded.
    pub fn record_trial(&mut self, membership_id: MembershipId) -> bool {
        self.trial_history.insert(membership_id)
    }

    pub fn attach_subscription(&mut self, subscription_id: SubscriptionId) {
        if !self.subscription_ids.contains(&subscription_id) {
            self.subscription_ids.push(subscription_id);
        }
    }

    pub fn store_profile(&mut self, gateway_id: GatewayId, profile: PaymentProfile) {
        self.gateway_profiles.insert(gateway_id, profile);
    }

    pub fn profile(&self, gateway_id: &GatewayId) -> Option<&PaymentProfile> {
        self.gateway_profiles.get(gateway_id)
    }
}
