//! In-memory invoice repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, GatewayId, InvoiceId, SubscriptionId};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::ports::InvoiceRepository;

#[derive(Debug, Clone)]
pub struct InMemoryInvoiceRepository {
    invoices: Arc<RwLock<HashMap<InvoiceId, Invoice>>>,
    next_number: Arc<AtomicU64>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Numbers start at `first` (installations migrating from another system).
    pub fn starting_at(first: u64) -> Self {
        Self {
            invoices: Arc::new(RwLock::new(HashMap::new())),
            next_number: Arc::new(AtomicU64::new(first)),
        }
    }

    pub async fn count(&self) -> usize {
        self.invoices.read().await.len()
    }
}

impl Default for InMemoryInvoiceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn save(&self, invoice: &Invoice) -> Result<(), DomainError> {
        self.next_number.fetch_max(invoice.number + 1, Ordering::SeqCst);
        self.invoices.write().await.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn save_if_status(
        &self,
        invoice: &Invoice,
        expected: InvoiceStatus,
    ) -> Result<(), DomainError> {
        let mut invoices = self.invoices.write().await;
        let stored = invoices.get(&invoice.id).ok_or_else(|| {
            DomainError::new(ErrorCode::InvoiceNotFound, "Invoice not found")
                .with_detail("invoice_id", invoice.id.to_string())
        })?;

        if stored.status() != expected {
            return Err(DomainError::new(
                ErrorCode::ConcurrencyConflict,
                "Invoice was modified concurrently",
            )
            .with_detail("invoice_id", invoice.id.to_string())
            .with_detail("subscription_id", invoice.subscription_id.to_string())
            .with_detail("expected_status", expected.to_string())
            .with_detail("actual_status", stored.status().to_string()));
        }

        self.next_number.fetch_max(invoice.number + 1, Ordering::SeqCst);
        invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError> {
        Ok(self.invoices.read().await.get(id).cloned())
    }

    async fn find_by_external_id(
        &self,
        gateway_id: &GatewayId,
        external_id: &str,
    ) -> Result<Option<Invoice>, DomainError> {
        Ok(self
            .invoices
            .read()
            .await
            .values()
            .find(|i| i.gateway_id.as_ref() == Some(gateway_id) && i.external_id() == Some(external_id))
            .cloned())
    }

    async fn find_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Invoice>, DomainError> {
        let mut found: Vec<Invoice> = self
            .invoices
            .read()
            .await
            .values()
            .filter(|i| &i.subscription_id == subscription_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.number);
        Ok(found)
    }

    async fn next_invoice_number(&self) -> Result<u64, DomainError> {
        Ok(self.next_number.fetch_add(1, Ordering::SeqCst))
    }
}
