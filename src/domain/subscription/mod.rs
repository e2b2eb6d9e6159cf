//! Subscription lifecycle.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate
//! - `status` - SubscriptionStatus state machine
//! - `events` - State change event

mod aggregate;
mod events;
mod status;

pub use aggregate::{Cancellation, Subscription};
pub use events::SubscriptionStateChanged;
pub use status::SubscriptionStatus;
