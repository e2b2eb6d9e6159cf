//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod access;
pub mod import;
pub mod lifecycle;

pub use access::{CheckAccessHandler, CheckAccessQuery};
pub use import::{
    ImportDataCommand, ImportDataHandler, ImportDocument, ImportError, ImportReport,
    ImportSession,
};
pub use lifecycle::{
    AttemptPurchaseCommand, AttemptPurchaseHandler, BillingServices, CancelSubscriptionCommand,
    CancelSubscriptionHandler, CreateInvoiceCommand, CreateInvoiceHandler,
    DeleteSubscriptionCommand, DeleteSubscriptionHandler, HandleConfirmationCommand,
    HandleConfirmationHandler, HandleConfirmationResult, InvoiceAdjustments, InvoicePurpose,
    LifecycleError, ProcessRenewalCommand, ProcessRenewalHandler, PurchaseOutcome,
    RenewalOutcome, RenewalRun, SubscribeCommand, SubscribeHandler, SubscribeResult,
};
