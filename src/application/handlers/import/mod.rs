//! Bulk import handlers.
//!
//! Brings memberships, members, subscriptions and invoices exported by
//! another installation into the engine. Cross-record id resolution goes
//! through an `ImportSession` owned by a single import run.

mod document;
mod error;
mod import_data;
mod report;
mod session;

pub use document::{
    ImportDocument, InvoiceRecord, MemberRecord, MembershipRecord, PaymentRecord,
    RegistrationRecord,
};
pub use error::ImportError;
pub use import_data::{ImportDataCommand, ImportDataHandler};
pub use report::{ImportFailure, ImportReport, RecordKind};
pub use session::ImportSession;
