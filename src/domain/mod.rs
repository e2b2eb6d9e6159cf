//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `access` - Rule sets and the access evaluator
//! - `membership` - Membership plans, pricing and trial terms
//! - `member` - Members, stored payment profiles and trial history
//! - `subscription` - Subscription lifecycle state machine
//! - `invoice` - Invoices, discounts and settlement events

pub mod access;
pub mod foundation;
pub mod invoice;
pub mod member;
pub mod membership;
pub mod subscription;
