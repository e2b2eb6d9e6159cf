//! Invoice status state machine.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Created, not yet settled. Retrying a charge keeps it here.
    Pending,
    /// Settled. Immutable apart from a refund annotation.
    Paid,
    /// Hard decline. Final; a retry bills through a new invoice.
    Failed,
    Refunded,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Failed => "failed",
            InvoiceStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for InvoiceStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, target),
            (Pending, Paid) | (Pending, Failed) | (Paid, Refunded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use InvoiceStatus::*;
        match self {
            Pending => vec![Paid, Failed],
            Paid => vec![Refunded],
            Failed | Refunded => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvoiceStatus::*;

    #[test]
    fn pending_settles_either_way() {
        assert_eq!(Pending.transition_to(Paid), Ok(Paid));
        assert_eq!(Pending.transition_to(Failed), Ok(Failed));
    }

    #[test]
    fn paid_only_moves_to_refunded() {
        assert_eq!(Paid.valid_transitions(), vec![Refunded]);
        assert!(Paid.transition_to(Pending).is_err());
        assert!(Paid.transition_to(Failed).is_err());
    }

    #[test]
    fn failed_is_final() {
        assert!(Failed.is_terminal());
        assert!(Failed.transition_to(Paid).is_err());
    }
}
