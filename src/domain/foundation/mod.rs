//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, errors and event plumbing
//! shared by the access and billing domains.

mod errors;
mod events;
mod ids;
mod percentage;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{ContentId, GatewayId, InvoiceId, MemberId, MembershipId, SubscriptionId};
pub use percentage::Percentage;
pub use state_machine::StateMachine;
pub use timestamp::{Period, PeriodUnit, Timestamp};
