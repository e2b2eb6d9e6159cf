//! Scriptable gateway for tests.
//!
//! Supports:
//! - Scripted outcomes (queued per call, with a fallback)
//! - Call counting and a log of charged invoices
//! - A hold gate that parks `charge` until released, for race tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::domain::foundation::{GatewayId, InvoiceId};
use crate::domain::invoice::Invoice;
use crate::ports::{ChargeResult, Gateway, PaymentDetails};

/// Mock gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = Arc::new(MockGateway::new("card"));
/// gateway.push_outcome(ChargeResult::Declined { reason: "nope".into() });
///
/// let result = handler.handle(cmd).await;
/// assert_eq!(gateway.call_count(), 1);
/// ```
pub struct MockGateway {
    id: GatewayId,
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    configured: bool,
    recurring: bool,
    requires_token: bool,
    outcomes: VecDeque<ChargeResult>,
    fallback: ChargeResult,
    charged: Vec<InvoiceId>,
    gate: Option<ChargeGate>,
    next_transaction: u64,
}

/// Parks the next charge until `release` is called.
#[derive(Clone)]
pub struct ChargeGate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl ChargeGate {
    /// Resolves once the held charge has reached the gateway.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Lets the held charge return.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl MockGateway {
    /// Creates a configured, recurring-capable gateway that succeeds.
    pub fn new(id: &str) -> Self {
        Self {
            id: GatewayId::new(id).unwrap_or_else(|_| GatewayId::known("mock")),
            inner: Arc::new(Mutex::new(MockState {
                configured: true,
                recurring: true,
                requires_token: false,
                outcomes: VecDeque::new(),
                fallback: ChargeResult::Succeeded {
                    transaction_id: String::new(),
                },
                charged: Vec::new(),
                gate: None,
                next_transaction: 1,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn unconfigured(self) -> Self {
        self.state().configured = false;
        self
    }

    pub fn non_recurring(self) -> Self {
        self.state().recurring = false;
        self
    }

    pub fn requiring_token(self) -> Self {
        self.state().requires_token = true;
        self
    }

    /// Queues the outcome of the next charge.
    ///
    /// An empty `transaction_id` in a success/pending outcome is replaced by
    /// a generated `txn_<n>`.
    pub fn push_outcome(&self, outcome: ChargeResult) {
        self.state().outcomes.push_back(outcome);
    }

    /// Outcome used once the queue is empty.
    pub fn set_fallback(&self, outcome: ChargeResult) {
        self.state().fallback = outcome;
    }

    /// Holds the next charge until the returned gate is released.
    pub fn hold_next_charge(&self) -> ChargeGate {
        let gate = ChargeGate {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.state().gate = Some(gate.clone());
        gate
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn call_count(&self) -> usize {
        self.state().charged.len()
    }

    pub fn charged_invoices(&self) -> Vec<InvoiceId> {
        self.state().charged.clone()
    }

    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }
}

fn with_transaction_id(outcome: ChargeResult, generated: String) -> ChargeResult {
    match outcome {
        ChargeResult::Succeeded { transaction_id } if transaction_id.is_empty() => {
            ChargeResult::Succeeded {
                transaction_id: generated,
            }
        }
        ChargeResult::Pending { transaction_id } if transaction_id.is_empty() => {
            ChargeResult::Pending {
                transaction_id: generated,
            }
        }
        other => other,
    }
}

#[async_trait]
impl Gateway for MockGateway {
    fn id(&self) -> GatewayId {
        self.id.clone()
    }

    fn is_configured(&self) -> bool {
        self.state().configured
    }

    fn supports_recurring(&self) -> bool {
        self.state().recurring
    }

    fn requires_token(&self) -> bool {
        self.state().requires_token
    }

    async fn charge(&self, invoice: &Invoice, _details: &PaymentDetails) -> ChargeResult {
        let (outcome, gate) = {
            let mut state = self.state();
            state.charged.push(invoice.id);
            let generated = format!("txn_{}", state.next_transaction);
            state.next_transaction += 1;
            let outcome = state
                .outcomes
                .pop_front()
                .unwrap_or_else(|| state.fallback.clone());
            (with_transaction_id(outcome, generated), state.gate.take())
        };

        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        outcome
    }
}
