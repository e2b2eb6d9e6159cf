//! In-memory storage adapters.
//!
//! Back the storage ports with `tokio::sync::RwLock`-guarded maps. Used by
//! tests and by embedders that keep state in process. Every read hands out
//! a clone, so callers always work on snapshots.

mod invoice_repository;
mod member_repository;
mod membership_repository;
mod subscription_repository;

pub use invoice_repository::InMemoryInvoiceRepository;
pub use member_repository::InMemoryMemberRepository;
pub use membership_repository::InMemoryMembershipRepository;
pub use subscription_repository::InMemorySubscriptionRepository;
