//! Collaborators shared by the lifecycle handlers.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::adapters::gateway::GatewayRegistry;
use crate::config::BillingConfig;
use crate::domain::foundation::{
    DomainEvent, EventEnvelope, EventId, InvoiceId, MemberId, MembershipId, SubscriptionId,
};
use crate::domain::invoice::{DiscountCalculator, Invoice, NoDiscount};
use crate::domain::member::Member;
use crate::domain::membership::Membership;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{
    EventPublisher, InvoiceRepository, MemberRepository, MembershipRepository,
    SubscriptionRepository,
};

use super::LifecycleError;

/// Ports, gateways and settings the lifecycle handlers work against.
///
/// Cheap to clone; every handler holds its own copy.
#[derive(Clone)]
pub struct BillingServices {
    pub members: Arc<dyn MemberRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub gateways: GatewayRegistry,
    pub discounts: Arc<dyn DiscountCalculator>,
    pub event_publisher: Arc<dyn EventPublisher>,
    pub billing: BillingConfig,
}

impl BillingServices {
    pub fn new(
        members: Arc<dyn MemberRepository>,
        memberships: Arc<dyn MembershipRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        gateways: GatewayRegistry,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            members,
            memberships,
            subscriptions,
            invoices,
            gateways,
            discounts: Arc::new(NoDiscount),
            event_publisher,
            billing: BillingConfig::default(),
        }
    }

    pub fn with_discounts(mut self, discounts: Arc<dyn DiscountCalculator>) -> Self {
        self.discounts = discounts;
        self
    }

    pub fn with_billing(mut self, billing: BillingConfig) -> Self {
        self.billing = billing;
        self
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Loading
    // ════════════════════════════════════════════════════════════════════════════

    pub(crate) async fn load_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Subscription, LifecycleError> {
        self.subscriptions
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(format!("Subscription not found: {}", id)))
    }

    pub(crate) async fn load_membership(
        &self,
        id: &MembershipId,
    ) -> Result<Membership, LifecycleError> {
        self.memberships
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(format!("Membership not found: {}", id)))
    }

    pub(crate) async fn load_invoice(&self, id: &InvoiceId) -> Result<Invoice, LifecycleError> {
        self.invoices
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(format!("Invoice not found: {}", id)))
    }

    /// Members are created on their first signup action.
    pub(crate) async fn load_or_create_member(
        &self,
        id: &MemberId,
    ) -> Result<Member, LifecycleError> {
        Ok(self
            .members
            .find_by_id(id)
            .await?
            .unwrap_or_else(|| Member::new(id.clone())))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Writing
    // ════════════════════════════════════════════════════════════════════════════

    /// Commits a transition with compare-and-swap against the loaded status
    /// and version.
    pub(crate) async fn commit(
        &self,
        subscription: &Subscription,
        expected_status: SubscriptionStatus,
    ) -> Result<Subscription, LifecycleError> {
        match self
            .subscriptions
            .compare_and_swap(subscription, expected_status)
            .await
        {
            Ok(stored) => Ok(stored),
            Err(e) => {
                let err = LifecycleError::from(e);
                if err.is_concurrency_conflict() {
                    warn!(
                        subscription_id = %subscription.id,
                        expected_status = %expected_status,
                        version = subscription.version,
                        "Subscription transition lost a concurrent update"
                    );
                }
                Err(err)
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Events
    // ════════════════════════════════════════════════════════════════════════════

    /// Publishes already-committed events. Failures are logged; the
    /// committed state stands.
    pub(crate) async fn publish(&self, events: PendingEvents) {
        if events.envelopes.is_empty() {
            return;
        }
        if let Err(e) = self.event_publisher.publish_all(events.envelopes).await {
            warn!(error = %e, member_id = %events.member_id, "Failed to publish domain events");
        }
    }
}

/// Events collected during one handler call, published after commit.
///
/// Envelopes from one call share a correlation id.
pub(crate) struct PendingEvents {
    member_id: MemberId,
    correlation_id: String,
    envelopes: Vec<EventEnvelope>,
}

impl PendingEvents {
    pub(crate) fn for_member(member_id: &MemberId) -> Self {
        Self {
            member_id: member_id.clone(),
            correlation_id: EventId::new().to_string(),
            envelopes: Vec::new(),
        }
    }

    pub(crate) fn push<E>(&mut self, event: &E)
    where
        E: DomainEvent + Serialize,
    {
        match EventEnvelope::from_event(event) {
            Ok(envelope) => self.envelopes.push(
                envelope
                    .with_member_id(self.member_id.to_string())
                    .with_correlation_id(self.correlation_id.clone()),
            ),
            Err(e) => warn!(
                error = %e,
                event_type = event.event_type(),
                "Failed to serialize domain event"
            ),
        }
    }
}
