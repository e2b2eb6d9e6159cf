//! Membership repository port.
//!
//! # Design
//!
//! - **Whole-entity replace**: `save` inserts or replaces the full plan
//! - **One base plan**: saving a second base protected-content plan fails
//! - **Reserved plans survive**: `delete` refuses special plans

use crate::domain::foundation::{DomainError, MembershipId};
use crate::domain::membership::Membership;
use async_trait::async_trait;

/// Repository port for membership plans.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert or replace a plan.
    ///
    /// # Errors
    ///
    /// - `DuplicateBaseMembership` if another base plan already exists
    /// - `DatabaseError` on persistence failure
    async fn save(&self, membership: &Membership) -> Result<(), DomainError>;

    /// Find a plan by id. Returns `None` if not found.
    async fn find_by_id(&self, id: &MembershipId) -> Result<Option<Membership>, DomainError>;

    /// Plans flagged active, reserved plans included.
    async fn find_active(&self) -> Result<Vec<Membership>, DomainError>;

    /// The base protected-content plan.
    ///
    /// # Errors
    ///
    /// - `MembershipNotFound` if the installation has not been seeded
    async fn find_base(&self) -> Result<Membership, DomainError>;

    async fn find_all(&self) -> Result<Vec<Membership>, DomainError>;

    /// Delete a plan.
    ///
    /// # Errors
    ///
    /// - `SpecialMembership` for reserved plans
    /// - `MembershipNotFound` if the plan doesn't exist
    async fn delete(&self, id: &MembershipId) -> Result<(), DomainError>;
}
