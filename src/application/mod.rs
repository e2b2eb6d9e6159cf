//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Access checks are queries; lifecycle and import operations are commands.

pub mod handlers;

pub use handlers::{
    // Access
    CheckAccessHandler, CheckAccessQuery,
    // Lifecycle
    AttemptPurchaseCommand, AttemptPurchaseHandler, BillingServices,
    CancelSubscriptionCommand, CancelSubscriptionHandler, CreateInvoiceCommand,
    CreateInvoiceHandler, DeleteSubscriptionCommand, DeleteSubscriptionHandler,
    HandleConfirmationCommand, HandleConfirmationHandler, HandleConfirmationResult,
    LifecycleError, ProcessRenewalCommand, ProcessRenewalHandler, PurchaseOutcome,
    RenewalOutcome, RenewalRun, SubscribeCommand, SubscribeHandler, SubscribeResult,
    // Import
    ImportDataCommand, ImportDataHandler, ImportDocument, ImportError, ImportReport,
};
