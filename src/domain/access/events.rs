//! Access domain events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ContentId, EventId, MemberId, Timestamp};
use crate::domain_event;

use super::RuleType;

/// A member was denied access to a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDenied {
    pub event_id: EventId,
    pub member_id: MemberId,
    pub content_id: ContentId,
    pub rule_type: RuleType,
    pub reason: String,
    pub occurred_at: Timestamp,
}

domain_event!(
    AccessDenied,
    event_type = "access.denied.v1",
    aggregate_id = member_id,
    aggregate_type = "Member",
    occurred_at = occurred_at,
    event_id = event_id
);
