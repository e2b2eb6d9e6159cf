//! CancelSubscriptionHandler - Command handler for member/admin cancellation.

use tracing::info;

use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::Subscription;

use super::services::PendingEvents;
use super::{BillingServices, LifecycleError};

/// Command to cancel a subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub reason: Option<String>,
    /// Revoke access now rather than at the expire date.
    pub immediate: bool,
}

impl CancelSubscriptionCommand {
    pub fn new(subscription_id: SubscriptionId) -> Self {
        Self {
            subscription_id,
            reason: None,
            immediate: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn immediately(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// Handler for cancellation.
///
/// Cancellation is terminal and stops further billing. Unless `immediate`
/// is set, access already paid for runs until the existing expire date.
pub struct CancelSubscriptionHandler {
    services: BillingServices,
}

impl CancelSubscriptionHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<Subscription, LifecycleError> {
        self.handle_at(cmd, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        cmd: CancelSubscriptionCommand,
        now: Timestamp,
    ) -> Result<Subscription, LifecycleError> {
        let mut subscription = self.services.load_subscription(&cmd.subscription_id).await?;
        let expected = subscription.status;

        let event = subscription.cancel(cmd.reason, cmd.immediate, now)?;
        let stored = self.services.commit(&subscription, expected).await?;

        info!(
            subscription_id = %stored.id,
            from = %expected,
            immediate = cmd.immediate,
            "Subscription cancelled"
        );

        let mut events = PendingEvents::for_member(&stored.member_id);
        events.push(&event);
        self.services.publish(events).await;

        Ok(stored)
    }
}
