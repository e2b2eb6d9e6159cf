//! In-memory subscription repository with compare-and-swap transitions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{
    DomainError, ErrorCode, MemberId, MembershipId, SubscriptionId, Timestamp,
};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_due(subscription: &Subscription, as_of: &Timestamp) -> bool {
    let reached = |at: Option<Timestamp>| at.map_or(false, |at| !at.is_after(as_of));
    match subscription.status {
        SubscriptionStatus::Trial => reached(subscription.trial_end),
        SubscriptionStatus::Active => reached(subscription.expire_date),
        SubscriptionStatus::Pending => reached(subscription.grace_until),
        SubscriptionStatus::Expired | SubscriptionStatus::Cancelled => false,
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.contains_key(&subscription.id) {
            return Err(DomainError::validation("subscription_id", "Subscription already exists")
                .with_detail("subscription_id", subscription.id.to_string()));
        }
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        subscription: &Subscription,
        expected_status: SubscriptionStatus,
    ) -> Result<Subscription, DomainError> {
        let mut subscriptions = self.subscriptions.write().await;
        let stored = subscriptions.get(&subscription.id).ok_or_else(|| {
            DomainError::new(ErrorCode::SubscriptionNotFound, "Subscription not found")
                .with_detail("subscription_id", subscription.id.to_string())
        })?;

        if stored.status != expected_status || stored.version != subscription.version {
            return Err(DomainError::new(
                ErrorCode::ConcurrencyConflict,
                "Subscription was modified concurrently",
            )
            .with_detail("subscription_id", subscription.id.to_string())
            .with_detail("expected_status", expected_status.to_string())
            .with_detail("actual_status", stored.status.to_string())
            .with_detail("expected_version", subscription.version.to_string())
            .with_detail("actual_version", stored.version.to_string()));
        }

        let mut committed = subscription.clone();
        committed.version = stored.version + 1;
        subscriptions.insert(committed.id, committed.clone());
        Ok(committed)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_by_member(&self, member_id: &MemberId) -> Result<Vec<Subscription>, DomainError> {
        let mut found: Vec<Subscription> = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| &s.member_id == member_id && !s.is_deleted())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn find_current(
        &self,
        member_id: &MemberId,
        membership_id: &MembershipId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .find(|s| {
                &s.member_id == member_id && &s.membership_id == membership_id && s.is_current()
            })
            .cloned())
    }

    async fn find_due(&self, as_of: Timestamp) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| !s.is_deleted() && is_due(s, &as_of))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| !s.is_deleted())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse_rfc3339(s).unwrap()
    }

    fn pending() -> Subscription {
        Subscription::new_pending(
            MemberId::new("member-1").unwrap(),
            MembershipId::new(),
            None,
            ts("2024-01-01T00:00:00Z"),
        )
    }

    #[tokio::test]
    async fn compare_and_swap_bumps_version() {
        let repo = InMemorySubscriptionRepository::new();
        let mut sub = pending();
        repo.insert(&sub).await.unwrap();

        sub.activate(None, ts("2024-01-01T00:00:00Z")).unwrap();
        let committed = repo
            .compare_and_swap(&sub, SubscriptionStatus::Pending)
            .await
            .unwrap();

        assert_eq!(committed.version, 1);
        assert_eq!(committed.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn stale_writer_gets_conflict() {
        let repo = InMemorySubscriptionRepository::new();
        let original = pending();
        repo.insert(&original).await.unwrap();

        let mut first = original.clone();
        first.activate(None, ts("2024-01-01T00:00:00Z")).unwrap();
        repo.compare_and_swap(&first, SubscriptionStatus::Pending).await.unwrap();

        let mut second = original.clone();
        second.expire(ts("2024-01-01T00:00:00Z")).unwrap();
        let err = repo
            .compare_and_swap(&second, SubscriptionStatus::Pending)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ConcurrencyConflict);
        let stored = repo.find_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn same_status_but_stale_version_conflicts() {
        let repo = InMemorySubscriptionRepository::new();
        let mut sub = pending();
        repo.insert(&sub).await.unwrap();
        sub.activate(None, ts("2024-01-01T00:00:00Z")).unwrap();
        let committed = repo.compare_and_swap(&sub, SubscriptionStatus::Pending).await.unwrap();

        // Two renewals racing from the same snapshot.
        let mut a = committed.clone();
        a.activate(None, ts("2024-02-01T00:00:00Z")).unwrap();
        let mut b = committed.clone();
        b.activate(None, ts("2024-02-01T00:00:00Z")).unwrap();

        repo.compare_and_swap(&a, SubscriptionStatus::Active).await.unwrap();
        let err = repo.compare_and_swap(&b, SubscriptionStatus::Active).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConcurrencyConflict);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let repo = InMemorySubscriptionRepository::new();
        let sub = pending();
        repo.insert(&sub).await.unwrap();
        assert!(repo.insert(&sub).await.is_err());
    }

    #[tokio::test]
    async fn find_current_ignores_terminal_and_deleted() {
        let repo = InMemorySubscriptionRepository::new();
        let mut sub = pending();
        repo.insert(&sub).await.unwrap();
        assert!(repo
            .find_current(&sub.member_id, &sub.membership_id)
            .await
            .unwrap()
            .is_some());

        sub.soft_delete(ts("2024-01-02T00:00:00Z"));
        repo.compare_and_swap(&sub, SubscriptionStatus::Pending).await.unwrap();

        assert!(repo
            .find_current(&sub.member_id, &sub.membership_id)
            .await
            .unwrap()
            .is_none());
        assert!(repo.find_by_member(&sub.member_id).await.unwrap().is_empty());
        assert!(repo.find_by_id(&sub.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn find_due_uses_status_specific_deadline() {
        let repo = InMemorySubscriptionRepository::new();
        let mut active = pending();
        active.activate(Some(ts("2024-02-01T00:00:00Z")), ts("2024-01-01T00:00:00Z")).unwrap();
        repo.insert(&active).await.unwrap();

        assert!(repo.find_due(ts("2024-01-31T00:00:00Z")).await.unwrap().is_empty());
        assert_eq!(repo.find_due(ts("2024-02-01T00:00:00Z")).await.unwrap().len(), 1);
    }
}
