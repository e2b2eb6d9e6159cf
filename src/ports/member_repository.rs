//! Member repository port.

use crate::domain::foundation::{DomainError, MemberId};
use crate::domain::member::Member;
use async_trait::async_trait;

/// Repository port for members. Members are never deleted through it.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Insert or replace a member.
    async fn save(&self, member: &Member) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError>;
}
