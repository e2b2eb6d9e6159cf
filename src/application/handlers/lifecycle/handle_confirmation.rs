//! HandleConfirmationHandler - Command handler for out-of-band settlement.

use tracing::info;

use crate::adapters::gateway::VerifiedConfirmation;
use crate::domain::foundation::{GatewayId, InvoiceId, Timestamp};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::domain::subscription::Subscription;
use crate::ports::ConfirmationStatus;

use super::services::PendingEvents;
use super::settlement::{fail_invoice, settle_paid};
use super::{BillingServices, LifecycleError};

/// Settlement reported by a gateway for one of its transactions.
#[derive(Debug, Clone)]
pub struct HandleConfirmationCommand {
    pub gateway_id: GatewayId,
    pub transaction_id: String,
    pub status: ConfirmationStatus,
}

impl From<VerifiedConfirmation> for HandleConfirmationCommand {
    fn from(confirmation: VerifiedConfirmation) -> Self {
        Self {
            gateway_id: confirmation.gateway_id,
            transaction_id: confirmation.transaction_id,
            status: confirmation.status,
        }
    }
}

/// Result of confirmation processing.
#[derive(Debug, Clone)]
pub enum HandleConfirmationResult {
    /// Invoice paid and subscription transitioned.
    Settled {
        invoice: Invoice,
        subscription: Subscription,
    },
    /// Invoice marked failed; subscription unchanged.
    Failed { invoice: Invoice },
    /// Paid invoice annotated as refunded; subscription unchanged.
    Refunded { invoice: Invoice },
    /// The invoice already reflects this confirmation. Nothing changed.
    AlreadyApplied { invoice: Invoice },
}

/// Handler for gateway confirmations.
///
/// Idempotent: the invoice's current status is checked before anything is
/// applied, so a repeated confirmation neither transitions the subscription
/// again nor extends its expire date twice.
pub struct HandleConfirmationHandler {
    services: BillingServices,
}

impl HandleConfirmationHandler {
    pub fn new(services: BillingServices) -> Self {
        Self { services }
    }

    pub async fn handle(
        &self,
        cmd: HandleConfirmationCommand,
    ) -> Result<HandleConfirmationResult, LifecycleError> {
        self.handle_at(cmd, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        cmd: HandleConfirmationCommand,
        now: Timestamp,
    ) -> Result<HandleConfirmationResult, LifecycleError> {
        let invoice = self
            .services
            .invoices
            .find_by_external_id(&cmd.gateway_id, &cmd.transaction_id)
            .await?
            .ok_or_else(|| {
                LifecycleError::not_found(format!(
                    "No invoice for transaction {} on gateway {}",
                    cmd.transaction_id, cmd.gateway_id
                ))
            })?;

        match (cmd.status, invoice.status()) {
            // Replays
            (ConfirmationStatus::Paid, InvoiceStatus::Paid | InvoiceStatus::Refunded)
            | (ConfirmationStatus::Failed, InvoiceStatus::Failed)
            | (ConfirmationStatus::Refunded, InvoiceStatus::Refunded) => {
                info!(
                    invoice_id = %invoice.id,
                    transaction_id = %cmd.transaction_id,
                    status = %cmd.status,
                    "Confirmation already applied"
                );
                Ok(HandleConfirmationResult::AlreadyApplied { invoice })
            }

            (ConfirmationStatus::Paid, InvoiceStatus::Pending) => {
                let invoice_id = invoice.id;
                let subscription = self.services.load_subscription(&invoice.subscription_id).await?;
                match settle_paid(
                    &self.services,
                    invoice,
                    subscription,
                    Some(cmd.transaction_id),
                    Some(cmd.gateway_id),
                    now,
                )
                .await
                {
                    Ok((invoice, subscription)) => Ok(HandleConfirmationResult::Settled {
                        invoice,
                        subscription,
                    }),
                    Err(e) if e.is_concurrency_conflict() => {
                        let applied = [InvoiceStatus::Paid, InvoiceStatus::Refunded];
                        self.settled_concurrently(&invoice_id, &applied, e).await
                    }
                    Err(e) => Err(e),
                }
            }

            (ConfirmationStatus::Failed, InvoiceStatus::Pending) => {
                let subscription = self.services.load_subscription(&invoice.subscription_id).await?;
                let failed = fail_invoice(
                    &self.services,
                    &invoice.id,
                    &subscription,
                    "Payment failed at gateway",
                    now,
                )
                .await?;
                match failed {
                    Some(invoice) => Ok(HandleConfirmationResult::Failed { invoice }),
                    None => Ok(HandleConfirmationResult::AlreadyApplied {
                        invoice: self.services.load_invoice(&invoice.id).await?,
                    }),
                }
            }

            (ConfirmationStatus::Refunded, InvoiceStatus::Paid) => {
                let mut invoice = invoice;
                let settled = invoice.mark_refunded(
                    Some(format!("Refunded by gateway ({})", cmd.transaction_id)),
                    now,
                )?;
                if let Err(e) = self
                    .services
                    .invoices
                    .save_if_status(&invoice, InvoiceStatus::Paid)
                    .await
                {
                    let e = LifecycleError::from(e);
                    if !e.is_concurrency_conflict() {
                        return Err(e);
                    }
                    return self
                        .settled_concurrently(&invoice.id, &[InvoiceStatus::Refunded], e)
                        .await;
                }
                info!(invoice_id = %invoice.id, transaction_id = %cmd.transaction_id, "Invoice refunded");

                let mut events = PendingEvents::for_member(&invoice.member_id);
                events.push(&settled);
                self.services.publish(events).await;

                Ok(HandleConfirmationResult::Refunded { invoice })
            }

            (status, current) => Err(LifecycleError::invalid_state(format!(
                "Cannot apply '{}' confirmation to invoice #{} in status {}",
                status, invoice.number, current
            ))),
        }
    }

    /// A concurrent writer changed the invoice first. If it now shows one of
    /// `applied`, the same confirmation won elsewhere; otherwise the conflict stands.
    async fn settled_concurrently(
        &self,
        invoice_id: &InvoiceId,
        applied: &[InvoiceStatus],
        conflict: LifecycleError,
    ) -> Result<HandleConfirmationResult, LifecycleError> {
        let invoice = self.services.load_invoice(invoice_id).await?;
        if applied.contains(&invoice.status()) {
            info!(
                invoice_id = %invoice.id,
                status = %invoice.status(),
                "Confirmation applied concurrently"
            );
            return Ok(HandleConfirmationResult::AlreadyApplied { invoice });
        }
        Err(conflict)
    }
}
