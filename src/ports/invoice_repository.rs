//! Invoice repository port.

use crate::domain::foundation::{DomainError, GatewayId, InvoiceId, SubscriptionId};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use async_trait::async_trait;

/// Repository port for invoices.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert or replace an invoice.
    async fn save(&self, invoice: &Invoice) -> Result<(), DomainError>;

    /// Replace a stored invoice only while its stored status is `expected`.
    ///
    /// A status mismatch fails with `ConcurrencyConflict`, so at most one
    /// writer moves an invoice out of a given status.
    async fn save_if_status(
        &self,
        invoice: &Invoice,
        expected: InvoiceStatus,
    ) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError>;

    /// Lookup used by out-of-band confirmations.
    async fn find_by_external_id(
        &self,
        gateway_id: &GatewayId,
        external_id: &str,
    ) -> Result<Option<Invoice>, DomainError>;

    /// Invoices of a subscription ordered by invoice number.
    async fn find_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Invoice>, DomainError>;

    /// Reserves the next invoice number. Monotonic per installation.
    async fn next_invoice_number(&self) -> Result<u64, DomainError>;
}
