//! Access evaluation across a member's memberships.
//!
//! Two precedence domains are kept apart on purpose:
//!
//! - Within one plan's hierarchy (tiered child -> parent) rule sets are
//!   combined with `RuleSet::merge`, where deny wins.
//! - Across independent plans a member holds, allow wins: qualifying
//!   through any one plan is enough.
//!
//! The evaluator is a pure function over snapshots fetched by the caller and
//! can run with any concurrency.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::domain::foundation::{ContentId, MembershipId, Timestamp};
use crate::domain::membership::Membership;
use crate::domain::subscription::Subscription;

use super::{Access, RuleSet, RuleType};

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DecisionReason {
    /// The base protected-content plan allows it for everyone.
    BaseMembership,
    /// A plan the member currently holds allows it.
    GrantedBy { membership_id: MembershipId },
    /// The member holds no subscription that currently grants access.
    NoQualifyingSubscription,
    /// The member has access-granting subscriptions but none covers this content.
    NotCovered,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::BaseMembership => write!(f, "allowed by base membership"),
            DecisionReason::GrantedBy { membership_id } => {
                write!(f, "allowed by membership {}", membership_id)
            }
            DecisionReason::NoQualifyingSubscription => write!(f, "no active or trial subscription"),
            DecisionReason::NotCovered => write!(f, "not covered by any held membership"),
        }
    }
}

/// Outcome of an access check. Denial is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: Access,
    pub reason: DecisionReason,
}

impl Decision {
    fn allow(reason: DecisionReason) -> Self {
        Self {
            outcome: Access::Allow,
            reason,
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            outcome: Access::Deny,
            reason,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome.is_allow()
    }
}

/// Everything needed to decide access for one member.
#[derive(Debug, Clone)]
pub struct AccessSnapshot {
    /// The base protected-content plan; always evaluated.
    pub base: Membership,

    /// Plans referenced by the subscriptions, including tiered parents.
    pub memberships: HashMap<MembershipId, Membership>,

    /// The member's subscriptions in any state.
    pub subscriptions: Vec<Subscription>,
}

/// Stateless access evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessEvaluator;

impl AccessEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn can_access(
        &self,
        snapshot: &AccessSnapshot,
        content_id: &ContentId,
        rule_type: RuleType,
        now: Timestamp,
    ) -> Decision {
        // 1. Base plan applies to every member.
        if snapshot.base.rule_set(rule_type).is_allowed(content_id) {
            return Decision::allow(DecisionReason::BaseMembership);
        }

        // 2. Any held plan that currently grants access and allows the id.
        let mut qualifying = 0usize;
        for subscription in snapshot.subscriptions.iter().filter(|s| s.grants_access(now)) {
            let Some(membership) = snapshot.memberships.get(&subscription.membership_id) else {
                continue;
            };
            qualifying += 1;

            if self
                .resolve_rule_set(membership, &snapshot.memberships, rule_type)
                .is_allowed(content_id)
            {
                return Decision::allow(DecisionReason::GrantedBy {
                    membership_id: membership.id,
                });
            }
        }

        // 3. Deny.
        if qualifying == 0 {
            Decision::deny(DecisionReason::NoQualifyingSubscription)
        } else {
            Decision::deny(DecisionReason::NotCovered)
        }
    }

    /// A plan's rules merged with its ancestors'. Stops at missing parents
    /// and at cycles.
    pub fn resolve_rule_set(
        &self,
        membership: &Membership,
        memberships: &HashMap<MembershipId, Membership>,
        rule_type: RuleType,
    ) -> RuleSet {
        let mut resolved = membership.rule_set(rule_type);
        let mut visited = HashSet::from([membership.id]);
        let mut cursor = membership.parent();

        while let Some(parent_id) = cursor {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = memberships.get(&parent_id) else {
                break;
            };
            // Same rule type on both sides, so merge cannot fail.
            if let Ok(merged) = resolved.merge(&parent.rule_set(rule_type)) {
                resolved = merged;
            }
            cursor = parent.parent();
        }

        resolved
    }
}
