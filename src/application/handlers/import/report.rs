use serde::Serialize;

/// Kind of record a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Membership,
    Member,
    Registration,
    Invoice,
}

/// A record that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub kind: RecordKind,
    pub source_id: String,
    pub reason: String,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub memberships_imported: usize,
    pub members_imported: usize,
    pub subscriptions_imported: usize,
    pub invoices_imported: usize,
    /// Subscriptions soft-deleted and memberships removed by `clear_all`.
    pub subscriptions_cleared: usize,
    pub memberships_cleared: usize,
    pub failures: Vec<ImportFailure>,
    /// Settings present in the document that the engine has no use for.
    pub settings_ignored: Vec<String>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, kind: RecordKind, source_id: &str, reason: impl Into<String>) {
        self.failures.push(ImportFailure {
            kind,
            source_id: source_id.to_string(),
            reason: reason.into(),
        });
    }

    pub fn failures_of(&self, kind: RecordKind) -> impl Iterator<Item = &ImportFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}
