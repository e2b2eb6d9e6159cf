//! Id resolution scoped to one import run.

use std::collections::HashMap;

use crate::domain::foundation::{InvoiceId, MemberId, MembershipId, SubscriptionId};

/// Maps source ids to the entities created for them.
///
/// Lives exactly as long as one `ImportDataHandler::handle` call, so two
/// imports never see each other's mappings.
#[derive(Debug, Default)]
pub struct ImportSession {
    memberships: HashMap<String, MembershipId>,
    members: HashMap<String, MemberId>,
    registrations: HashMap<String, SubscriptionId>,
    invoices: HashMap<String, InvoiceId>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_membership(&mut self, source_id: &str, id: MembershipId) {
        self.memberships.insert(source_id.to_string(), id);
    }

    pub fn membership(&self, source_id: &str) -> Option<MembershipId> {
        self.memberships.get(source_id).copied()
    }

    pub fn record_member(&mut self, source_id: &str, id: MemberId) {
        self.members.insert(source_id.to_string(), id);
    }

    pub fn member(&self, source_id: &str) -> Option<&MemberId> {
        self.members.get(source_id)
    }

    pub fn record_registration(&mut self, source_id: &str, id: SubscriptionId) {
        self.registrations.insert(source_id.to_string(), id);
    }

    pub fn registration(&self, source_id: &str) -> Option<SubscriptionId> {
        self.registrations.get(source_id).copied()
    }

    pub fn record_invoice(&mut self, source_id: &str, id: InvoiceId) {
        self.invoices.insert(source_id.to_string(), id);
    }

    pub fn invoice(&self, source_id: &str) -> Option<InvoiceId> {
        self.invoices.get(source_id).copied()
    }
}
