//! CheckAccessHandler - Query handler for content access decisions.
//!
//! Fetches the member's subscriptions and the plans they reference (tiered
//! parents included), then hands an immutable snapshot to the pure
//! `AccessEvaluator`. Denials are published as `access.denied` events.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::access::{AccessDenied, AccessEvaluator, AccessSnapshot, Decision, RuleType};
use crate::domain::foundation::{
    ContentId, DomainError, EventEnvelope, EventId, MemberId, MembershipId, Timestamp,
};
use crate::domain::membership::Membership;
use crate::ports::{EventPublisher, MembershipRepository, SubscriptionRepository};

/// Query to check whether a member may view a content item.
#[derive(Debug, Clone)]
pub struct CheckAccessQuery {
    pub member_id: MemberId,
    pub content_id: ContentId,
    pub rule_type: RuleType,
    /// Evaluation time; defaults to now.
    pub at: Option<Timestamp>,
}

impl CheckAccessQuery {
    pub fn new(member_id: MemberId, content_id: ContentId, rule_type: RuleType) -> Self {
        Self {
            member_id,
            content_id,
            rule_type,
            at: None,
        }
    }

    pub fn at(mut self, at: Timestamp) -> Self {
        self.at = Some(at);
        self
    }
}

/// Handler for access checks.
///
/// Only storage failures are errors; "no access" is a normal `Decision`.
pub struct CheckAccessHandler {
    memberships: Arc<dyn MembershipRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    event_publisher: Arc<dyn EventPublisher>,
    evaluator: AccessEvaluator,
}

impl CheckAccessHandler {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            memberships,
            subscriptions,
            event_publisher,
            evaluator: AccessEvaluator::new(),
        }
    }

    pub async fn handle(&self, query: CheckAccessQuery) -> Result<Decision, DomainError> {
        let now = query.at.unwrap_or_else(Timestamp::now);
        let snapshot = self.snapshot(&query.member_id).await?;

        let decision = self
            .evaluator
            .can_access(&snapshot, &query.content_id, query.rule_type, now);

        debug!(
            member_id = %query.member_id,
            content_id = %query.content_id,
            rule_type = %query.rule_type,
            allowed = decision.is_allowed(),
            reason = %decision.reason,
            "Access decision"
        );

        if !decision.is_allowed() {
            self.publish_denial(&query, &decision, now).await;
        }

        Ok(decision)
    }

    /// Loads the member's subscriptions and every plan needed to resolve
    /// their rule sets.
    pub async fn snapshot(&self, member_id: &MemberId) -> Result<AccessSnapshot, DomainError> {
        let base = self.memberships.find_base().await?;
        let subscriptions = self.subscriptions.find_by_member(member_id).await?;

        let mut memberships: HashMap<MembershipId, Membership> = HashMap::new();
        let mut pending: Vec<MembershipId> =
            subscriptions.iter().map(|s| s.membership_id).collect();

        while let Some(id) = pending.pop() {
            if memberships.contains_key(&id) {
                continue;
            }
            if let Some(membership) = self.memberships.find_by_id(&id).await? {
                if let Some(parent) = membership.parent() {
                    pending.push(parent);
                }
                memberships.insert(id, membership);
            }
        }

        Ok(AccessSnapshot {
            base,
            memberships,
            subscriptions,
        })
    }

    async fn publish_denial(&self, query: &CheckAccessQuery, decision: &Decision, now: Timestamp) {
        let event = AccessDenied {
            event_id: EventId::new(),
            member_id: query.member_id.clone(),
            content_id: query.content_id.clone(),
            rule_type: query.rule_type,
            reason: decision.reason.to_string(),
            occurred_at: now,
        };

        let envelope = match EventEnvelope::from_event(&event) {
            Ok(envelope) => envelope.with_member_id(query.member_id.to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to serialize access.denied event");
                return;
            }
        };

        if let Err(e) = self.event_publisher.publish(envelope).await {
            warn!(error = %e, member_id = %query.member_id, "Failed to publish access.denied event");
        }
    }
}
