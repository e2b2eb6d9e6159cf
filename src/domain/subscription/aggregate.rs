//! Subscription aggregate.
//!
//! Binds one member to one membership plan and owns the lifecycle state
//! machine. Every status change goes through `transition`, which validates
//! against `SubscriptionStatus` and produces the event describing it.
//!
//! # Design Decisions
//!
//! - **Optimistic concurrency**: `version` is checked and bumped by the
//!   repository's compare-and-swap; the aggregate never bumps it itself
//! - **Soft delete**: `deleted_at` hides the record but keeps invoice history
//! - **Cancellation keeps paid time**: access runs to `expire_date` unless
//!   the cancellation is immediate

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, EventId, GatewayId, MemberId, MembershipId, StateMachine,
    SubscriptionId, Timestamp,
};

use super::{SubscriptionStateChanged, SubscriptionStatus};

/// Why and how a subscription was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: Option<String>,
    /// Revoke access now instead of at the expire date.
    pub immediate: bool,
    pub cancelled_at: Timestamp,
}

/// Subscription aggregate.
///
/// # Invariants
///
/// - Status changes follow `SubscriptionStatus` transitions
/// - Terminal subscriptions are never reopened; re-subscribing creates a new record
/// - `grace_until` is set only while a renewal is in grace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,

    pub member_id: MemberId,

    pub membership_id: MembershipId,

    pub status: SubscriptionStatus,

    pub start_date: Timestamp,

    /// End of the trial, if one was started.
    pub trial_end: Option<Timestamp>,

    /// End of the paid access window. `None` for perpetual plans.
    pub expire_date: Option<Timestamp>,

    /// Gateway used for payments on this subscription.
    pub gateway_id: Option<GatewayId>,

    pub cancellation: Option<Cancellation>,

    /// Deadline for paying an overdue renewal before expiry.
    pub grace_until: Option<Timestamp>,

    /// Optimistic concurrency token, owned by the repository.
    pub version: u64,

    pub deleted_at: Option<Timestamp>,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates a subscription awaiting its first payment.
    pub fn new_pending(
        member_id: MemberId,
        membership_id: MembershipId,
        gateway_id: Option<GatewayId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            member_id,
            membership_id,
            status: SubscriptionStatus::Pending,
            start_date: now,
            trial_end: None,
            expire_date: None,
            gateway_id,
            cancellation: None,
            grace_until: None,
            version: 0,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Non-terminal and not deleted.
    pub fn is_current(&self) -> bool {
        !self.status.is_terminal() && self.deleted_at.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn in_grace(&self) -> bool {
        self.status == SubscriptionStatus::Pending && self.grace_until.is_some()
    }

    /// Whether this subscription currently lets its plan's rules apply.
    pub fn grants_access(&self, now: Timestamp) -> bool {
        if self.is_deleted() {
            return false;
        }
        match self.status {
            SubscriptionStatus::Trial | SubscriptionStatus::Active => true,
            SubscriptionStatus::Cancelled => match (&self.cancellation, self.expire_date) {
                (Some(c), Some(expire)) if !c.immediate => now.is_before(&expire),
                _ => false,
            },
            SubscriptionStatus::Pending | SubscriptionStatus::Expired => false,
        }
    }

    /// Enters the trial.
    pub fn start_trial(
        &mut self,
        trial_end: Timestamp,
        now: Timestamp,
    ) -> Result<SubscriptionStateChanged, DomainError> {
        let event = self.transition(SubscriptionStatus::Trial, now)?;
        self.trial_end = Some(trial_end);
        self.expire_date = Some(trial_end);
        Ok(self.with_expiry(event))
    }

    /// Activates or renews with a new access end. Clears any grace window.
    pub fn activate(
        &mut self,
        expire_date: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<SubscriptionStateChanged, DomainError> {
        let event = self.transition(SubscriptionStatus::Active, now)?;
        self.expire_date = expire_date;
        self.grace_until = None;
        Ok(self.with_expiry(event))
    }

    /// Moves an unpaid renewal (or trial conversion) into grace.
    pub fn enter_grace(
        &mut self,
        grace_until: Timestamp,
        now: Timestamp,
    ) -> Result<SubscriptionStateChanged, DomainError> {
        if self.status == SubscriptionStatus::Pending {
            return Err(self.invalid_transition(SubscriptionStatus::Pending));
        }
        let event = self.transition(SubscriptionStatus::Pending, now)?;
        self.grace_until = Some(grace_until);
        Ok(event)
    }

    pub fn expire(&mut self, now: Timestamp) -> Result<SubscriptionStateChanged, DomainError> {
        let event = self.transition(SubscriptionStatus::Expired, now)?;
        self.grace_until = None;
        Ok(event)
    }

    /// Cancels the subscription. Terminal; no further invoices follow.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        immediate: bool,
        now: Timestamp,
    ) -> Result<SubscriptionStateChanged, DomainError> {
        let event = self.transition(SubscriptionStatus::Cancelled, now)?;
        self.cancellation = Some(Cancellation {
            reason,
            immediate,
            cancelled_at: now,
        });
        self.grace_until = None;
        Ok(event)
    }

    pub fn soft_delete(&mut self, now: Timestamp) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.updated_at = now;
        }
    }

    fn transition(
        &mut self,
        target: SubscriptionStatus,
        now: Timestamp,
    ) -> Result<SubscriptionStateChanged, DomainError> {
        if self.is_deleted() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Subscription has been deleted",
            )
            .with_detail("subscription_id", self.id.to_string()));
        }

        let old_status = self.status;
        if !old_status.can_transition_to(&target) {
            return Err(self.invalid_transition(target));
        }
        self.status = target;
        self.updated_at = now;

        Ok(SubscriptionStateChanged {
            event_id: EventId::new(),
            subscription_id: self.id,
            member_id: self.member_id.clone(),
            membership_id: self.membership_id,
            old_status,
            new_status: target,
            expire_date: self.expire_date,
            occurred_at: now,
        })
    }

    fn with_expiry(&self, mut event: SubscriptionStateChanged) -> SubscriptionStateChanged {
        event.expire_date = self.expire_date;
        event
    }

    fn invalid_transition(&self, target: SubscriptionStatus) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!("Cannot transition subscription from {} to {}", self.status, target),
        )
        .with_detail("subscription_id", self.id.to_string())
    }
}
