//! Subscription repository port.
//!
//! # Design
//!
//! - **Compare-and-swap writes**: every transition after insert goes through
//!   `compare_and_swap`, which checks the stored status and version against
//!   what the caller loaded. This is the single-writer discipline per
//!   subscription: of two racing writers, exactly one commits.
//! - **Soft delete**: deleted subscriptions are kept for invoice history
//!   and excluded from member queries

use crate::domain::foundation::{DomainError, MemberId, MembershipId, SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use async_trait::async_trait;

/// Repository port for subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a new subscription.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the id already exists
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Replace a subscription if its stored state still matches.
    ///
    /// `subscription.version` is the version the caller loaded;
    /// `expected_status` is the status it loaded. On success the stored copy
    /// is returned with its version bumped.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if status or version no longer match
    /// - `SubscriptionNotFound` if it doesn't exist
    async fn compare_and_swap(
        &self,
        subscription: &Subscription,
        expected_status: SubscriptionStatus,
    ) -> Result<Subscription, DomainError>;

    /// Find by id, including soft-deleted records.
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// All non-deleted subscriptions of a member.
    async fn find_by_member(&self, member_id: &MemberId) -> Result<Vec<Subscription>, DomainError>;

    /// The non-terminal, non-deleted subscription for a member/plan pair.
    async fn find_current(
        &self,
        member_id: &MemberId,
        membership_id: &MembershipId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Non-terminal subscriptions with a trial end, expire date or grace
    /// deadline at or before `as_of`.
    async fn find_due(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError>;

    /// All non-deleted subscriptions.
    async fn find_all(&self) -> Result<Vec<Subscription>, DomainError>;
}
