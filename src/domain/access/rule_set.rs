//! Per-membership allow/deny list for one rule type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{ContentId, MembershipId, ValidationError};

use super::{Access, RuleType};

/// Explicit rules of one type owned by one membership.
///
/// # Invariants
///
/// - An id without an explicit entry falls back to `default_access`
/// - Evaluation is pure and total: every id yields allow or deny
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Membership that owns these rules.
    pub membership_id: MembershipId,

    pub rule_type: RuleType,

    /// Outcome for ids with no explicit entry.
    pub default_access: Access,

    rules: BTreeMap<ContentId, Access>,
}

impl RuleSet {
    /// Creates an empty rule set using the rule type's default policy.
    pub fn new(membership_id: MembershipId, rule_type: RuleType) -> Self {
        Self {
            membership_id,
            rule_type,
            default_access: rule_type.default_access(),
            rules: BTreeMap::new(),
        }
    }

    /// Overrides the category-level default ("allow all posts except listed").
    pub fn with_default(mut self, default_access: Access) -> Self {
        self.default_access = default_access;
        self
    }

    pub fn allow(mut self, content_id: ContentId) -> Self {
        self.set(content_id, Access::Allow);
        self
    }

    pub fn deny(mut self, content_id: ContentId) -> Self {
        self.set(content_id, Access::Deny);
        self
    }

    /// Sets or replaces the explicit entry for an id.
    pub fn set(&mut self, content_id: ContentId, access: Access) {
        self.rules.insert(content_id, access);
    }

    /// Removes an explicit entry, returning it to the default.
    pub fn clear(&mut self, content_id: &ContentId) -> Option<Access> {
        self.rules.remove(content_id)
    }

    /// Returns the outcome for a content id.
    ///
    /// An explicit entry wins over the default. When several entries match
    /// (prefix-matched types), any deny among them wins.
    pub fn evaluate(&self, content_id: &ContentId) -> Access {
        let matching = self.rule_type.policy().matching;
        let mut matched: Option<Access> = None;

        for (key, access) in &self.rules {
            if matching.matches(key, content_id) {
                if *access == Access::Deny {
                    return Access::Deny;
                }
                matched = Some(*access);
            }
        }

        matched.unwrap_or(self.default_access)
    }

    pub fn is_allowed(&self, content_id: &ContentId) -> bool {
        self.evaluate(content_id).is_allow()
    }

    /// Merges rules inherited from another set of the same type.
    ///
    /// Deny wins for conflicting explicit entries and for the defaults, so
    /// inheritance can never widen access beyond what either side denies.
    /// The result keeps `self`'s owner.
    pub fn merge(&self, other: &RuleSet) -> Result<RuleSet, ValidationError> {
        if self.rule_type != other.rule_type {
            return Err(ValidationError::invalid_format(
                "rule_type",
                format!("cannot merge {} rules into {} rules", other.rule_type, self.rule_type),
            ));
        }

        let mut rules = self.rules.clone();
        for (content_id, access) in &other.rules {
            rules
                .entry(content_id.clone())
                .and_modify(|existing| *existing = existing.deny_wins(*access))
                .or_insert(*access);
        }

        Ok(RuleSet {
            membership_id: self.membership_id,
            rule_type: self.rule_type,
            default_access: self.default_access.deny_wins(other.default_access),
            rules,
        })
    }

    /// Number of explicit entries.
    pub fn count_rules(&self) -> usize {
        self.rules.len()
    }

    /// Ids with explicit entries, in sorted order.
    pub fn list_content_ids(&self) -> Vec<ContentId> {
        self.rules.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ContentId, Access)> {
        self.rules.iter().map(|(id, access)| (id, *access))
    }
}
