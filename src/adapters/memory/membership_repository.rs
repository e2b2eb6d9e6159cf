//! In-memory membership repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, MembershipId};
use crate::domain::membership::Membership;
use crate::ports::MembershipRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipRepository {
    memberships: Arc<RwLock<HashMap<MembershipId, Membership>>>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository seeded with a base protected-content plan.
    pub async fn seeded() -> Result<(Self, Membership), DomainError> {
        let repo = Self::new();
        let base = Membership::base_protected_content();
        repo.save(&base).await?;
        Ok((repo, base))
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn save(&self, membership: &Membership) -> Result<(), DomainError> {
        let mut memberships = self.memberships.write().await;
        if membership.is_base()
            && memberships
                .values()
                .any(|m| m.is_base() && m.id != membership.id)
        {
            return Err(DomainError::new(
                ErrorCode::DuplicateBaseMembership,
                "A base protected-content membership already exists",
            ));
        }
        memberships.insert(membership.id, membership.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &MembershipId) -> Result<Option<Membership>, DomainError> {
        Ok(self.memberships.read().await.get(id).cloned())
    }

    async fn find_active(&self) -> Result<Vec<Membership>, DomainError> {
        let mut active: Vec<Membership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(active)
    }

    async fn find_base(&self) -> Result<Membership, DomainError> {
        self.memberships
            .read()
            .await
            .values()
            .find(|m| m.is_base())
            .cloned()
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::MembershipNotFound,
                    "No base protected-content membership configured",
                )
            })
    }

    async fn find_all(&self) -> Result<Vec<Membership>, DomainError> {
        Ok(self.memberships.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &MembershipId) -> Result<(), DomainError> {
        let mut memberships = self.memberships.write().await;
        let membership = memberships.get(id).ok_or_else(|| {
            DomainError::new(ErrorCode::MembershipNotFound, "Membership not found")
                .with_detail("membership_id", id.to_string())
        })?;
        membership.ensure_deletable()?;
        memberships.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::PricingMode;

    #[tokio::test]
    async fn second_base_membership_is_rejected() {
        let (repo, base) = InMemoryMembershipRepository::seeded().await.unwrap();

        let err = repo
            .save(&Membership::base_protected_content())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateBaseMembership);

        // Re-saving the same base plan is fine.
        repo.save(&base).await.unwrap();
        assert_eq!(repo.find_base().await.unwrap().id, base.id);
    }

    #[tokio::test]
    async fn special_memberships_cannot_be_deleted() {
        let (repo, base) = InMemoryMembershipRepository::seeded().await.unwrap();
        let err = repo.delete(&base.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SpecialMembership);

        let plan = Membership::new("Basic", PricingMode::Free, 0).unwrap();
        repo.save(&plan).await.unwrap();
        repo.delete(&plan.id).await.unwrap();
        assert!(repo.find_by_id(&plan.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_active_skips_inactive_plans() {
        let repo = InMemoryMembershipRepository::new();
        let mut retired = Membership::new("Retired", PricingMode::Free, 0).unwrap();
        retired.active = false;
        let current = Membership::new("Current", PricingMode::Free, 0).unwrap();
        repo.save(&retired).await.unwrap();
        repo.save(&current).await.unwrap();

        let active = repo.find_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, current.id);
    }

    #[tokio::test]
    async fn missing_base_is_not_found() {
        let err = InMemoryMembershipRepository::new().find_base().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MembershipNotFound);
    }
}
