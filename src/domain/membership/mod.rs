//! Membership plans.
//!
//! # Module Structure
//!
//! - `aggregate` - Membership plan entity, kinds and reserved plans
//! - `pricing` - Pricing modes and trial terms

mod aggregate;
mod pricing;

pub use aggregate::{Membership, MembershipKind, SpecialMembership};
pub use pricing::{PricingMode, TrialTerms};
