//! Invoice domain events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventId, InvoiceId, SubscriptionId, Timestamp};
use crate::domain_event;

use super::InvoiceStatus;

/// An invoice reached a settled status (paid, failed or refunded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSettled {
    pub event_id: EventId,
    pub invoice_id: InvoiceId,
    pub subscription_id: SubscriptionId,
    pub invoice_number: u64,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub external_id: Option<String>,
    pub occurred_at: Timestamp,
}

domain_event!(
    InvoiceSettled,
    event_type = "invoice.settled.v1",
    aggregate_id = invoice_id,
    aggregate_type = "Invoice",
    occurred_at = occurred_at,
    event_id = event_id
);
