//! Lifecycle controller handlers.
//!
//! Orchestrate subscription transitions, invoice creation and settlement,
//! and gateway interaction.
//!
//! ## Commands
//! - Subscribing (with trial eligibility and repeat-purchase reuse)
//! - Creating invoices
//! - Attempting purchases
//! - Handling out-of-band gateway confirmations
//! - Processing renewals for the external periodic trigger
//! - Cancelling and soft-deleting subscriptions
//!
//! All transitions are committed with compare-and-swap on the
//! subscription, so concurrent writers for one subscription cannot both
//! succeed.

mod attempt_purchase;
mod cancel_subscription;
mod create_invoice;
mod delete_subscription;
mod error;
mod handle_confirmation;
mod invoicing;
mod process_renewal;
mod services;
mod settlement;
mod subscribe;

pub use attempt_purchase::{AttemptPurchaseCommand, AttemptPurchaseHandler};
pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler};
pub use create_invoice::{CreateInvoiceCommand, CreateInvoiceHandler};
pub use delete_subscription::{DeleteSubscriptionCommand, DeleteSubscriptionHandler};
pub use error::LifecycleError;
pub use handle_confirmation::{
    HandleConfirmationCommand, HandleConfirmationHandler, HandleConfirmationResult,
};
pub use invoicing::{InvoiceAdjustments, InvoicePurpose};
pub use process_renewal::{ProcessRenewalCommand, ProcessRenewalHandler, RenewalOutcome, RenewalRun};
pub use services::BillingServices;
pub use settlement::PurchaseOutcome;
pub use subscribe::{SubscribeCommand, SubscribeHandler, SubscribeResult};

#[cfg(test)]
mod test_support;
