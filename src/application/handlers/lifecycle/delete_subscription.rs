//! DeleteSubscriptionHandler - Command handler for soft deletion.

use tracing::info;

use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::Subscription;

use super::{BillingServices, LifecycleError};

/// Command to hide a subscription while keeping its invoices.
#[derive(Debug, Clone)]
pub struct DeleteSubscriptionCommand {
    pub subscription_id: SubscriptionId,
}

impl DeleteSubscriptionCommand {
    pub fn new(subscription_id: SubscriptionId) -> Self {
        Self { subscription_id }
    }
}

/// Handler for soft deletion.
///
/// The record and its invoices stay in storage; the subscription stops
/// granting access and drops out of member queries. Deleting twice is a
/// no-op.
pub struct DeleteSubscriptionHandler {
    services: BillingServices,
}

impl DeleteSubscriptionHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    pub async fn handle(
        &self,
        cmd: DeleteSubscriptionCommand,
    ) -> Result<Subscription, LifecycleError> {
        let mut subscription = self.services.load_subscription(&cmd.subscription_id).await?;
        if subscription.is_deleted() {
            return Ok(subscription);
        }

        let expected = subscription.status;
        subscription.soft_delete(Timestamp::now());
        let stored = self.services.commit(&subscription, expected).await?;

        info!(subscription_id = %stored.id, "Subscription soft-deleted");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::SubscriptionRepository;

    use super::super::test_support::{member_id, Harness};
    use super::super::{SubscribeCommand, SubscribeHandler};

    #[tokio::test]
    async fn deletion_hides_subscription_and_keeps_invoices() {
        let h = Harness::new().await;
        let plan = h.monthly(1_500).await;
        let sub = SubscribeHandler::new(h.services.clone())
            .handle(SubscribeCommand::new(member_id(), plan.id))
            .await
            .unwrap();

        let deleted = DeleteSubscriptionHandler::new(h.services.clone())
            .handle(DeleteSubscriptionCommand::new(sub.subscription.id))
            .await
            .unwrap();

        assert!(deleted.is_deleted());
        assert_eq!(deleted.status, SubscriptionStatus::Pending);
        assert!(h
            .subscriptions
            .find_current(&member_id(), &plan.id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(h.invoices.count().await, 1);
    }

    #[tokio::test]
    async fn deleting_twice_is_a_no_op() {
        let h = Harness::new().await;
        let plan = h.monthly(1_500).await;
        let sub = SubscribeHandler::new(h.services.clone())
            .handle(SubscribeCommand::new(member_id(), plan.id))
            .await
            .unwrap();
        let handler = DeleteSubscriptionHandler::new(h.services.clone());

        let first = handler.handle(DeleteSubscriptionCommand::new(sub.subscription.id)).await.unwrap();
        let second = handler.handle(DeleteSubscriptionCommand::new(sub.subscription.id)).await.unwrap();

        assert_eq!(first, second);
    }
}
