//! ImportDataHandler - Command handler for bulk import of legacy data.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::{GatewayId, InvoiceId, MemberId, Timestamp};
use crate::domain::invoice::{Invoice, TaxLine};
use crate::domain::member::{Member, PaymentProfile};
use crate::domain::membership::{Membership, MembershipKind, SpecialMembership};
use crate::domain::subscription::Subscription;
use crate::ports::{InvoiceRepository, MemberRepository, MembershipRepository, SubscriptionRepository};

use super::document::{parse_date, to_bps, to_cents};
use super::{
    ImportDocument, ImportError, ImportReport, ImportSession, InvoiceRecord, MemberRecord,
    MembershipRecord, PaymentRecord, RecordKind, RegistrationRecord,
};

/// Command to import a document.
#[derive(Debug, Clone)]
pub struct ImportDataCommand {
    pub document: ImportDocument,
    /// Remove existing subscriptions and non-special memberships first.
    pub clear_all: bool,
}

impl ImportDataCommand {
    pub fn new(document: ImportDocument) -> Self {
        Self {
            document,
            clear_all: false,
        }
    }

    pub fn clearing_existing(mut self) -> Self {
        self.clear_all = true;
        self
    }
}

/// Handler for bulk import.
///
/// Imports memberships, then members with their stored payment data,
/// registrations and invoices. A record that cannot be imported is
/// reported and skipped along with the records nested under it; the run
/// continues with the next one. Only storage failures while clearing abort.
///
/// Registrations never target special memberships, and a registration is
/// skipped when the member already holds a current subscription to the plan.
pub struct ImportDataHandler {
    members: Arc<dyn MemberRepository>,
    memberships: Arc<dyn MembershipRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

impl ImportDataHandler {
    pub fn new(
        members: Arc<dyn MemberRepository>,
        memberships: Arc<dyn MembershipRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            members,
            memberships,
            subscriptions,
            invoices,
        }
    }

    pub async fn handle(&self, cmd: ImportDataCommand) -> Result<ImportReport, ImportError> {
        self.handle_at(cmd, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        cmd: ImportDataCommand,
        now: Timestamp,
    ) -> Result<ImportReport, ImportError> {
        let doc = cmd.document;
        let mut session = ImportSession::new();
        let mut report = ImportReport::default();

        info!(
            source = %doc.source,
            plugin_version = %doc.plugin_version,
            memberships = doc.memberships.len(),
            members = doc.members.len(),
            clear_all = cmd.clear_all,
            "Import started"
        );

        // 1. Clear existing data
        if cmd.clear_all {
            self.clear_all(&mut report, now).await?;
        }

        // 2. Memberships, parents before tier children
        let (roots, children): (Vec<&MembershipRecord>, Vec<&MembershipRecord>) =
            doc.memberships.iter().partition(|m| m.parent.is_none());
        for record in roots.into_iter().chain(children) {
            match self.import_membership(record, &mut session).await {
                Ok(true) => report.memberships_imported += 1,
                Ok(false) => {}
                Err(reason) => {
                    warn!(source_id = %record.id, reason = %reason, "Membership not imported");
                    report.fail(RecordKind::Membership, &record.id, reason);
                }
            }
        }

        // 3. Members with their registrations and invoices
        for record in &doc.members {
            self.import_member(record, &mut session, &mut report, now).await;
        }

        // 4. Settings have no counterpart here
        report.settings_ignored = doc.settings.keys().cloned().collect();

        info!(
            memberships = report.memberships_imported,
            members = report.members_imported,
            subscriptions = report.subscriptions_imported,
            invoices = report.invoices_imported,
            failures = report.failures.len(),
            "Import finished"
        );
        Ok(report)
    }

    async fn clear_all(&self, report: &mut ImportReport, now: Timestamp) -> Result<(), ImportError> {
        for mut subscription in self.subscriptions.find_all().await? {
            let expected = subscription.status;
            subscription.soft_delete(now);
            self.subscriptions.compare_and_swap(&subscription, expected).await?;
            report.subscriptions_cleared += 1;
        }

        for membership in self.memberships.find_all().await? {
            if membership.is_special() {
                continue;
            }
            self.memberships.delete(&membership.id).await?;
            report.memberships_cleared += 1;
        }

        warn!(
            subscriptions = report.subscriptions_cleared,
            memberships = report.memberships_cleared,
            "Existing data cleared before import"
        );
        Ok(())
    }

    /// Returns false when the record maps onto an existing reserved plan.
    async fn import_membership(
        &self,
        record: &MembershipRecord,
        session: &mut ImportSession,
    ) -> Result<bool, String> {
        if let Some(special) = record.special_kind() {
            let reserved = self.reserved_plan(special).await.map_err(reason)?;
            session.record_membership(&record.id, reserved.id);
            return Ok(false);
        }

        let mut membership = Membership::new(record.name.clone(), record.pricing()?, record.price_cents()?)
            .map_err(reason)?
            .with_trial(record.trial_terms()?);
        if record.kind.as_deref() == Some("dripped") {
            membership = membership.with_kind(MembershipKind::Dripped);
        }
        if let Some(parent) = &record.parent {
            let parent_id = session
                .membership(parent)
                .ok_or_else(|| format!("parent membership '{}' was not imported", parent))?;
            membership = membership.with_parent(parent_id);
        }
        membership.active = record.active;
        membership.private = record.private;

        self.memberships.save(&membership).await.map_err(reason)?;
        session.record_membership(&record.id, membership.id);
        Ok(true)
    }

    async fn reserved_plan(&self, special: SpecialMembership) -> Result<Membership, ImportError> {
        if special == SpecialMembership::BaseProtectedContent {
            return Ok(self.memberships.find_base().await?);
        }
        if let Some(existing) = self
            .memberships
            .find_all()
            .await?
            .into_iter()
            .find(|m| m.special == Some(special))
        {
            return Ok(existing);
        }
        let guest = Membership::guest();
        self.memberships.save(&guest).await?;
        Ok(guest)
    }

    async fn import_member(
        &self,
        record: &MemberRecord,
        session: &mut ImportSession,
        report: &mut ImportReport,
        now: Timestamp,
    ) {
        let mut member = match self.load_member(record).await {
            Ok(member) => member,
            Err(reason) => {
                warn!(member = %record.label(), reason = %reason, "Member not imported");
                report.fail(RecordKind::Member, &record.id, reason);
                return;
            }
        };

        for (gateway, payment) in &record.payment {
            match payment_profile(gateway, payment) {
                Ok(Some((gateway_id, profile))) => member.store_profile(gateway_id, profile),
                Ok(None) => {}
                Err(reason) => report.fail(
                    RecordKind::Member,
                    &record.id,
                    format!("payment data for '{}': {}", gateway, reason),
                ),
            }
        }
        if let Err(e) = self.members.save(&member).await {
            report.fail(RecordKind::Member, &record.id, reason(e));
            return;
        }
        session.record_member(&record.id, member.id.clone());
        report.members_imported += 1;

        for registration in &record.subscriptions {
            self.import_registration(&mut member, registration, session, report, now)
                .await;
        }

        if let Err(e) = self.members.save(&member).await {
            report.fail(RecordKind::Member, &record.id, reason(e));
        }
    }

    async fn load_member(&self, record: &MemberRecord) -> Result<Member, String> {
        let member_id = MemberId::new(record.email.trim()).map_err(reason)?;
        Ok(self
            .members
            .find_by_id(&member_id)
            .await
            .map_err(reason)?
            .unwrap_or_else(|| Member::new(member_id)))
    }

    async fn import_registration(
        &self,
        member: &mut Member,
        record: &RegistrationRecord,
        session: &mut ImportSession,
        report: &mut ImportReport,
        now: Timestamp,
    ) {
        let subscription = match self.create_subscription(member, record, session, now).await {
            Ok(subscription) => subscription,
            Err(reason) => {
                warn!(source_id = %record.id, member_id = %member.id, reason = %reason, "Registration not imported");
                report.fail(RecordKind::Registration, &record.id, reason);
                return;
            }
        };

        member.attach_subscription(subscription.id);
        if subscription.trial_end.is_some() || record.invoices.iter().any(|i| i.for_trial) {
            member.record_trial(subscription.membership_id);
        }
        session.record_registration(&record.id, subscription.id);
        report.subscriptions_imported += 1;

        for invoice in &record.invoices {
            match self.import_invoice(&subscription, invoice, now).await {
                Ok(invoice_id) => {
                    session.record_invoice(&invoice.id, invoice_id);
                    report.invoices_imported += 1;
                }
                Err(reason) => {
                    warn!(source_id = %invoice.id, reason = %reason, "Invoice not imported");
                    report.fail(RecordKind::Invoice, &invoice.id, reason);
                }
            }
        }
    }

    async fn create_subscription(
        &self,
        member: &Member,
        record: &RegistrationRecord,
        session: &ImportSession,
        now: Timestamp,
    ) -> Result<Subscription, String> {
        let membership_id = session
            .membership(&record.membership)
            .ok_or_else(|| format!("membership '{}' was not imported", record.membership))?;
        let membership = self
            .memberships
            .find_by_id(&membership_id)
            .await
            .map_err(reason)?
            .ok_or_else(|| format!("membership '{}' no longer exists", record.membership))?;
        if membership.is_special() {
            return Err(format!("special membership '{}' is never registered", membership.name));
        }
        if self
            .subscriptions
            .find_current(&member.id, &membership.id)
            .await
            .map_err(reason)?
            .is_some()
        {
            return Err(format!("member already holds a current '{}' subscription", membership.name));
        }

        let subscription = build_subscription(&member.id, &membership, record, now)?;
        self.subscriptions.insert(&subscription).await.map_err(reason)?;
        Ok(subscription)
    }

    async fn import_invoice(
        &self,
        subscription: &Subscription,
        record: &InvoiceRecord,
        now: Timestamp,
    ) -> Result<InvoiceId, String> {
        let due = optional_date("due", record.due.as_deref())?.unwrap_or(now);
        let mut invoice = Invoice::new(
            subscription.id,
            subscription.member_id.clone(),
            subscription.membership_id,
            record.invoice_number,
            record.currency.clone(),
            to_cents(record.amount)?,
            due,
            record.for_trial,
        )
        .map_err(reason)?;

        let coupon = record.coupon.clone().filter(|c| !c.trim().is_empty());
        invoice.apply_discount(to_cents(record.discount)?, coupon).map_err(reason)?;
        invoice.apply_pro_rate(to_cents(record.pro_rate)?).map_err(reason)?;
        if let Some(rate) = record.tax_rate.filter(|r| *r > 0.0) {
            let tax = TaxLine {
                name: record.tax_name.clone().unwrap_or_else(|| "Tax".to_string()),
                rate_bps: to_bps(rate)?,
            };
            invoice.apply_tax(Some(tax)).map_err(reason)?;
        }
        if let Some(gateway) = record.gateway.as_deref().filter(|g| !g.is_empty()) {
            invoice.set_gateway(GatewayId::new(gateway).map_err(reason)?).map_err(reason)?;
        }
        for note in &record.notes {
            invoice.add_note(note.clone()).map_err(reason)?;
        }
        if let Some(total) = record.total {
            let recorded = to_cents(total)?;
            if recorded != invoice.total_cents() {
                invoice
                    .add_note(format!(
                        "Source total {} differs from recomputed total {}",
                        recorded,
                        invoice.total_cents()
                    ))
                    .map_err(reason)?;
            }
        }

        let external_id = record.external_id.clone().filter(|e| !e.trim().is_empty());
        match record.status.as_str() {
            "pending" => {
                if let Some(external_id) = external_id {
                    invoice.record_external_id(external_id).map_err(reason)?;
                }
            }
            "paid" => {
                invoice.mark_paid(external_id, due).map_err(reason)?;
            }
            "failed" => {
                if let Some(external_id) = external_id {
                    invoice.record_external_id(external_id).map_err(reason)?;
                }
                invoice.mark_failed("Imported as failed", now).map_err(reason)?;
            }
            "refunded" => {
                invoice.mark_paid(external_id, due).map_err(reason)?;
                invoice.mark_refunded(None, now).map_err(reason)?;
            }
            other => return Err(format!("unknown invoice status '{}'", other)),
        }

        self.invoices.save(&invoice).await.map_err(reason)?;
        Ok(invoice.id)
    }
}

/// Builds a subscription in the recorded state through the normal transitions.
fn build_subscription(
    member_id: &MemberId,
    membership: &Membership,
    record: &RegistrationRecord,
    now: Timestamp,
) -> Result<Subscription, String> {
    let start = optional_date("start", record.start.as_deref())?.unwrap_or(now);
    let expire = optional_date("expire", record.expire.as_deref())?;
    let gateway = record
        .gateway
        .as_deref()
        .filter(|g| !g.is_empty())
        .map(GatewayId::new)
        .transpose()
        .map_err(reason)?;

    let mut subscription = Subscription::new_pending(member_id.clone(), membership.id, gateway, start);
    match record.status.as_deref().unwrap_or("pending") {
        "pending" => {}
        "trial" => {
            let trial_end = optional_date("trial_end", record.trial_end.as_deref())?
                .or(expire)
                .ok_or_else(|| "trial registration without an end date".to_string())?;
            subscription.start_trial(trial_end, start).map_err(reason)?;
        }
        "active" => {
            subscription.activate(expire, start).map_err(reason)?;
        }
        "expired" => {
            subscription.expire_date = expire;
            subscription.expire(now).map_err(reason)?;
        }
        "cancelled" | "canceled" | "deactivated" => {
            subscription.expire_date = expire;
            subscription
                .cancel(Some("Cancelled before import".to_string()), false, now)
                .map_err(reason)?;
        }
        other => return Err(format!("unknown registration status '{}'", other)),
    }
    Ok(subscription)
}

/// Profile for a gateway, or `None` when no customer reference was exported.
fn payment_profile(
    gateway: &str,
    payment: &PaymentRecord,
) -> Result<Option<(GatewayId, PaymentProfile)>, String> {
    let Some(customer) = payment.customer.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Ok(None);
    };
    let gateway_id = GatewayId::new(gateway).map_err(reason)?;
    let mut profile = PaymentProfile::new(customer).map_err(reason)?;
    if let (Some(last4), Some(expiry)) = (payment.last4(), payment.expiry()) {
        let brand = payment.card_brand.clone().unwrap_or_else(|| "card".to_string());
        profile = profile.with_card(brand, last4, expiry).map_err(reason)?;
    }
    Ok(Some((gateway_id, profile)))
}

fn optional_date(field: &str, value: Option<&str>) -> Result<Option<Timestamp>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse_date(v)
            .map(Some)
            .ok_or_else(|| format!("{} '{}' is not a date", field, v)),
    }
}

fn reason(err: impl Display) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::adapters::memory::{
        InMemoryInvoiceRepository, InMemoryMemberRepository, InMemoryMembershipRepository,
        InMemorySubscriptionRepository,
    };
    use crate::domain::foundation::Period;
    use crate::domain::invoice::InvoiceStatus;
    use crate::domain::membership::PricingMode;
    use crate::domain::subscription::SubscriptionStatus;

    struct Fixture {
        handler: ImportDataHandler,
        members: Arc<InMemoryMemberRepository>,
        memberships: Arc<InMemoryMembershipRepository>,
        subscriptions: Arc<InMemorySubscriptionRepository>,
        invoices: Arc<InMemoryInvoiceRepository>,
    }

    async fn fixture() -> Fixture {
        let (memberships, _) = InMemoryMembershipRepository::seeded().await.unwrap();
        let memberships = Arc::new(memberships);
        let members = Arc::new(InMemoryMemberRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let invoices = Arc::new(InMemoryInvoiceRepository::new());
        let handler = ImportDataHandler::new(
            members.clone(),
            memberships.clone(),
            subscriptions.clone(),
            invoices.clone(),
        );
        Fixture {
            handler,
            members,
            memberships,
            subscriptions,
            invoices,
        }
    }

    fn document(memberships: serde_json::Value, members: serde_json::Value) -> ImportDocument {
        ImportDocument::from_value(json!({
            "source": "Legacy Membership",
            "plugin_version": "1.0.4",
            "export_time": "2026-01-01 12:00:00",
            "notes": ["exported for migration"],
            "memberships": memberships,
            "members": members,
            "settings": { "addons": { "coupon": true } }
        }))
        .unwrap()
    }

    fn gold() -> serde_json::Value {
        json!({
            "id": "10",
            "name": "Gold",
            "type": "simple",
            "pay_type": "recurring",
            "period_unit": 1,
            "period_type": "months",
            "price": 15
        })
    }

    fn alice(registrations: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "u1",
            "username": "alice",
            "email": "alice@example.com",
            "payment": {
                "card": { "customer": "cus_alice", "card_num": "4242", "card_exp": "12/30" }
            },
            "subscriptions": registrations
        })
    }

    fn now() -> Timestamp {
        Timestamp::parse_rfc3339("2026-02-01T00:00:00Z").unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Full imports
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn imports_memberships_members_registrations_and_invoices() {
        let f = fixture().await;
        let doc = document(
            json!([gold()]),
            json!([alice(json!([{
                "id": "r1",
                "membership": "10",
                "status": "active",
                "start": "2026-01-15",
                "expire": "2026-02-15",
                "gateway": "card",
                "invoices": [{
                    "id": "i1",
                    "invoice_number": 41,
                    "external_id": "ch_1",
                    "gateway": "card",
                    "status": "paid",
                    "currency": "USD",
                    "amount": 15,
                    "total": 15,
                    "due": "2026-01-15"
                }]
            }]))]),
        );

        let report = f.handler.handle_at(ImportDataCommand::new(doc), now()).await.unwrap();

        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(report.memberships_imported, 1);
        assert_eq!(report.members_imported, 1);
        assert_eq!(report.subscriptions_imported, 1);
        assert_eq!(report.invoices_imported, 1);
        assert_eq!(report.settings_ignored, vec!["addons".to_string()]);

        let member_id = MemberId::new("alice@example.com").unwrap();
        let member = f.members.find_by_id(&member_id).await.unwrap().unwrap();
        assert_eq!(member.subscription_ids.len(), 1);
        let profile = member.profile(&GatewayId::new("card").unwrap()).unwrap();
        assert_eq!(profile.token, "cus_alice");
        assert_eq!(profile.card_last4.as_deref(), Some("4242"));

        let subs = f.subscriptions.find_by_member(&member_id).await.unwrap();
        assert_eq!(subs[0].status, SubscriptionStatus::Active);
        assert_eq!(subs[0].expire_date, parse_date("2026-02-15"));

        let invoices = f.invoices.find_by_subscription(&subs[0].id).await.unwrap();
        assert_eq!(invoices[0].number, 41);
        assert_eq!(invoices[0].status(), InvoiceStatus::Paid);
        assert_eq!(invoices[0].total_cents(), 1_500);
        assert_eq!(f.invoices.next_invoice_number().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn tier_children_resolve_parents_listed_later() {
        let f = fixture().await;
        let doc = document(
            json!([
                { "id": "21", "name": "Gold Tier", "type": "tier", "parent": "20", "free": true },
                { "id": "20", "name": "Tiers", "free": true }
            ]),
            json!([]),
        );

        let report = f.handler.handle_at(ImportDataCommand::new(doc), now()).await.unwrap();

        assert!(report.is_clean(), "{:?}", report.failures);
        let all = f.memberships.find_all().await.unwrap();
        let parent = all.iter().find(|m| m.name == "Tiers").unwrap();
        let child = all.iter().find(|m| m.name == "Gold Tier").unwrap();
        assert_eq!(child.parent(), Some(parent.id));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Per-record failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn special_membership_is_never_registered() {
        let f = fixture().await;
        let doc = document(
            json!([{ "id": "1", "name": "Protected Content", "special": "protected_content" }]),
            json!([alice(json!([{ "id": "r1", "membership": "1", "status": "active" }]))]),
        );

        let report = f.handler.handle_at(ImportDataCommand::new(doc), now()).await.unwrap();

        assert_eq!(report.memberships_imported, 0);
        assert_eq!(report.members_imported, 1);
        assert_eq!(report.subscriptions_imported, 0);
        assert_eq!(report.failures_of(RecordKind::Registration).count(), 1);
        assert_eq!(f.memberships.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_records_are_reported_and_the_rest_imported() {
        let f = fixture().await;
        let doc = document(
            json!([gold(), { "id": "11", "name": "Broken", "pay_type": "weekly-ish" }]),
            json!([
                alice(json!([
                    { "id": "r1", "membership": "11", "status": "active" },
                    { "id": "r2", "membership": "10", "status": "active", "expire": "2026-03-01",
                      "invoices": [
                          { "id": "i1", "invoice_number": 1, "status": "paid", "currency": "USD", "amount": 15 },
                          { "id": "i2", "invoice_number": 2, "status": "lost", "currency": "USD", "amount": 15 }
                      ] }
                ])),
                { "id": "u2", "email": "  ", "subscriptions": [] }
            ]),
        );

        let report = f.handler.handle_at(ImportDataCommand::new(doc), now()).await.unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.memberships_imported, 1);
        assert_eq!(report.members_imported, 1);
        assert_eq!(report.subscriptions_imported, 1);
        assert_eq!(report.invoices_imported, 1);
        assert_eq!(report.failures_of(RecordKind::Membership).count(), 1);
        assert_eq!(report.failures_of(RecordKind::Registration).count(), 1);
        assert_eq!(report.failures_of(RecordKind::Invoice).count(), 1);
        assert_eq!(report.failures_of(RecordKind::Member).count(), 1);
    }

    #[tokio::test]
    async fn second_current_registration_for_same_plan_is_skipped() {
        let f = fixture().await;
        let doc = document(
            json!([gold()]),
            json!([alice(json!([
                { "id": "r1", "membership": "10", "status": "active", "expire": "2026-03-01" },
                { "id": "r2", "membership": "10", "status": "pending" }
            ]))]),
        );

        let report = f.handler.handle_at(ImportDataCommand::new(doc), now()).await.unwrap();

        assert_eq!(report.subscriptions_imported, 1);
        let failures: Vec<_> = report.failures_of(RecordKind::Registration).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source_id, "r2");

        let member_id = MemberId::new("alice@example.com").unwrap();
        assert_eq!(f.subscriptions.find_by_member(&member_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn each_run_resolves_ids_only_within_itself() {
        let f = fixture().await;
        let first = document(json!([gold()]), json!([]));
        f.handler.handle_at(ImportDataCommand::new(first), now()).await.unwrap();

        let second = document(
            json!([]),
            json!([alice(json!([{ "id": "r1", "membership": "10", "status": "active" }]))]),
        );
        let report = f.handler.handle_at(ImportDataCommand::new(second), now()).await.unwrap();

        assert_eq!(report.subscriptions_imported, 0);
        assert_eq!(report.failures_of(RecordKind::Registration).count(), 1);
    }

    #[tokio::test]
    async fn trial_registration_records_trial_history() {
        let f = fixture().await;
        let mut plan = gold();
        plan["trial"] = json!(true);
        plan["trial_period_unit"] = json!(7);
        plan["trial_period_type"] = json!("days");
        let doc = document(
            json!([plan]),
            json!([alice(json!([{
                "id": "r1", "membership": "10", "status": "trial",
                "start": "2026-01-25", "trial_end": "2026-02-01"
            }]))]),
        );

        let report = f.handler.handle_at(ImportDataCommand::new(doc), now()).await.unwrap();

        assert!(report.is_clean(), "{:?}", report.failures);
        let member = f
            .members
            .find_by_id(&MemberId::new("alice@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.trial_history.len(), 1);
        let subs = f.subscriptions.find_by_member(&member.id).await.unwrap();
        assert_eq!(subs[0].status, SubscriptionStatus::Trial);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Clear all
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn clear_all_removes_plans_and_hides_subscriptions() {
        let f = fixture().await;
        let old = Membership::new("Old", PricingMode::Recurring { cycle: Period::months(1) }, 500).unwrap();
        f.memberships.save(&old).await.unwrap();
        let sub = Subscription::new_pending(MemberId::new("bob").unwrap(), old.id, None, now());
        f.subscriptions.insert(&sub).await.unwrap();

        let doc = document(json!([gold()]), json!([]));
        let report = f
            .handler
            .handle_at(ImportDataCommand::new(doc).clearing_existing(), now())
            .await
            .unwrap();

        assert_eq!(report.subscriptions_cleared, 1);
        assert_eq!(report.memberships_cleared, 1);
        let remaining = f.memberships.find_all().await.unwrap();
        assert!(remaining.iter().any(|m| m.is_base()));
        assert!(remaining.iter().any(|m| m.name == "Gold"));
        assert!(!remaining.iter().any(|m| m.name == "Old"));
        let stored = f.subscriptions.find_by_id(&sub.id).await.unwrap().unwrap();
        assert!(stored.is_deleted());
    }
}
