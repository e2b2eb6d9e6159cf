//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `MemberRepository`, `MembershipRepository`, `InvoiceRepository`
//! - `SubscriptionRepository` - with compare-and-swap transitions
//!
//! ## Payment Ports
//!
//! - `Gateway` - Payment processor contract
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing domain events

mod event_publisher;
mod gateway;
mod invoice_repository;
mod member_repository;
mod membership_repository;
mod subscription_repository;

pub use event_publisher::EventPublisher;
pub use gateway::{ChargeResult, ConfirmationStatus, Gateway, PaymentDetails};
pub use invoice_repository::InvoiceRepository;
pub use member_repository::MemberRepository;
pub use membership_repository::MembershipRepository;
pub use subscription_repository::SubscriptionRepository;
