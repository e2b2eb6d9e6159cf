//! Subscription domain events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventId, MemberId, MembershipId, SubscriptionId, Timestamp};
use crate::domain_event;

use super::SubscriptionStatus;

/// A committed subscription status change (including active -> active renewals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStateChanged {
    pub event_id: EventId,
    pub subscription_id: SubscriptionId,
    pub member_id: MemberId,
    pub membership_id: MembershipId,
    pub old_status: SubscriptionStatus,
    pub new_status: SubscriptionStatus,
    pub expire_date: Option<Timestamp>,
    pub occurred_at: Timestamp,
}

domain_event!(
    SubscriptionStateChanged,
    event_type = "subscription.state_changed.v1",
    aggregate_id = subscription_id,
    aggregate_type = "Subscription",
    occurred_at = occurred_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DomainEvent, EventEnvelope};

    #[test]
    fn envelope_carries_old_and_new_status() {
        let event = SubscriptionStateChanged {
            event_id: EventId::new(),
            subscription_id: SubscriptionId::new(),
            member_id: MemberId::new("m-1").unwrap(),
            membership_id: MembershipId::new(),
            old_status: SubscriptionStatus::Pending,
            new_status: SubscriptionStatus::Active,
            expire_date: None,
            occurred_at: Timestamp::now(),
        };

        let envelope = EventEnvelope::from_event(&event).unwrap();
        assert_eq!(event.event_type(), "subscription.state_changed.v1");
        assert_eq!(envelope.aggregate_id, event.subscription_id.to_string());
        assert_eq!(envelope.payload["old_status"], "pending");
        assert_eq!(envelope.payload["new_status"], "active");
    }
}
