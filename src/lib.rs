//! Membership Engine - content access rules and subscription billing lifecycle.
//!
//! The crate decides whether a member may view a protected content item and
//! drives each subscription through trial, payment, renewal, grace, expiry and
//! cancellation, settling invoices through pluggable payment gateways.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
