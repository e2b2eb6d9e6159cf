//! In-memory member repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, MemberId};
use crate::domain::member::Member;
use crate::ports::MemberRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryMemberRepository {
    members: Arc<RwLock<HashMap<MemberId, Member>>>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.members.read().await.len()
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn save(&self, member: &Member) -> Result<(), DomainError> {
        self.members
            .write()
            .await
            .insert(member.id.clone(), member.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError> {
        Ok(self.members.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_replaces_whole_member() {
        let repo = InMemoryMemberRepository::new();
        let id = MemberId::new("member-1").unwrap();
        let mut member = Member::new(id.clone());
        repo.save(&member).await.unwrap();

        member.record_trial(crate::domain::foundation::MembershipId::new());
        repo.save(&member).await.unwrap();

        let found = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.trial_history.len(), 1);
        assert_eq!(repo.count().await, 1);
    }
}
