//! Shared fixtures for lifecycle handler tests.

use std::sync::Arc;

use crate::adapters::events::InMemoryEventBus;
use crate::adapters::gateway::{FreeGateway, GatewayRegistry, MockGateway};
use crate::adapters::memory::{
    InMemoryInvoiceRepository, InMemoryMemberRepository, InMemoryMembershipRepository,
    InMemorySubscriptionRepository,
};
use crate::config::BillingConfig;
use crate::domain::foundation::{GatewayId, MemberId, Period, Timestamp};
use crate::domain::member::{Member, PaymentProfile};
use crate::domain::membership::{Membership, PricingMode, TrialTerms};
use crate::ports::{ChargeResult, MemberRepository, MembershipRepository};

use super::BillingServices;

pub(crate) struct Harness {
    pub services: BillingServices,
    pub members: Arc<InMemoryMemberRepository>,
    pub memberships: Arc<InMemoryMembershipRepository>,
    pub subscriptions: Arc<InMemorySubscriptionRepository>,
    pub invoices: Arc<InMemoryInvoiceRepository>,
    pub bus: Arc<InMemoryEventBus>,
    /// Recurring card gateway, succeeds by default.
    pub card: Arc<MockGateway>,
    /// Non-recurring gateway that always answers pending.
    pub manual: Arc<MockGateway>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_billing(BillingConfig::default()).await
    }

    pub async fn with_billing(billing: BillingConfig) -> Self {
        let (memberships, _base) = InMemoryMembershipRepository::seeded().await.unwrap();
        let memberships = Arc::new(memberships);
        let members = Arc::new(InMemoryMemberRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let invoices = Arc::new(InMemoryInvoiceRepository::starting_at(billing.invoice_number_start));
        let bus = Arc::new(InMemoryEventBus::new());

        let card = Arc::new(MockGateway::new("card"));
        let manual = Arc::new(MockGateway::new("manual").non_recurring());
        manual.set_fallback(ChargeResult::Pending {
            transaction_id: String::new(),
        });

        let gateways = GatewayRegistry::new()
            .with(Arc::new(FreeGateway::new()))
            .with(card.clone())
            .with(manual.clone());

        let services = BillingServices::new(
            members.clone(),
            memberships.clone(),
            subscriptions.clone(),
            invoices.clone(),
            gateways,
            bus.clone(),
        )
        .with_billing(billing);

        Self {
            services,
            members,
            memberships,
            subscriptions,
            invoices,
            bus,
            card,
            manual,
        }
    }

    pub async fn plan(&self, pricing: PricingMode, price_cents: i64, trial: TrialTerms) -> Membership {
        let plan = Membership::new("Gold", pricing, price_cents)
            .unwrap()
            .with_trial(trial);
        self.memberships.save(&plan).await.unwrap();
        plan
    }

    pub async fn monthly(&self, price_cents: i64) -> Membership {
        self.plan(
            PricingMode::Recurring {
                cycle: Period::months(1),
            },
            price_cents,
            TrialTerms::disabled(),
        )
        .await
    }

    pub async fn store_card_profile(&self, member_id: &MemberId, token: &str) {
        let mut member = self
            .members
            .find_by_id(member_id)
            .await
            .unwrap()
            .unwrap_or_else(|| Member::new(member_id.clone()));
        member.store_profile(card_id(), PaymentProfile::new(token).unwrap());
        self.members.save(&member).await.unwrap();
    }
}

pub(crate) fn member_id() -> MemberId {
    MemberId::new("member-1").unwrap()
}

pub(crate) fn card_id() -> GatewayId {
    GatewayId::new("card").unwrap()
}

pub(crate) fn manual_id() -> GatewayId {
    GatewayId::new("manual").unwrap()
}

pub(crate) fn ts(s: &str) -> Timestamp {
    Timestamp::parse_rfc3339(s).unwrap()
}
