//! Subscription status state machine.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a member's subscription to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Awaiting payment: either the first payment or a renewal in grace.
    /// No access.
    Pending,

    /// Trial in progress. Full access until the trial ends.
    Trial,

    /// Paid and current.
    Active,

    /// Ended without payment or reached the end of its plan. Terminal.
    Expired,

    /// Cancelled by member or admin. Terminal; paid access may run to the
    /// existing expire date.
    Cancelled,
}

impl SubscriptionStatus {
    /// Statuses that grant access by themselves, ignoring dates.
    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Trial)
                | (Pending, Active)
                | (Pending, Expired)
                | (Pending, Cancelled)
            // From TRIAL
                | (Trial, Active)
                | (Trial, Pending) // Conversion invoice unpaid at trial end
                | (Trial, Expired)
                | (Trial, Cancelled)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, Pending) // Grace
                | (Active, Expired)
                | (Active, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Trial, Active, Expired, Cancelled],
            Trial => vec![Active, Pending, Expired, Cancelled],
            Active => vec![Active, Pending, Expired, Cancelled],
            Expired | Cancelled => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubscriptionStatus::*;

    const ALL: [SubscriptionStatus; 5] = [Pending, Trial, Active, Expired, Cancelled];

    #[test]
    fn pending_can_start_trial_or_activate() {
        assert_eq!(Pending.transition_to(Trial), Ok(Trial));
        assert_eq!(Pending.transition_to(Active), Ok(Active));
    }

    #[test]
    fn active_can_renew_to_active() {
        assert_eq!(Active.transition_to(Active), Ok(Active));
    }

    #[test]
    fn active_can_fall_back_to_pending_for_grace() {
        assert!(Active.can_transition_to(&Pending));
    }

    #[test]
    fn trial_cannot_restart() {
        assert!(!Trial.can_transition_to(&Trial));
        assert!(!Active.can_transition_to(&Trial));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for target in ALL {
            assert!(Expired.transition_to(target).is_err());
            assert!(Cancelled.transition_to(target).is_err());
        }
        assert!(Expired.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn every_live_state_can_be_cancelled() {
        for status in [Pending, Trial, Active] {
            assert!(status.can_transition_to(&Cancelled));
        }
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(&to),
                    from.valid_transitions().contains(&to),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn only_trial_and_active_grant_access() {
        assert!(Trial.grants_access());
        assert!(Active.grants_access());
        assert!(!Pending.grants_access());
        assert!(!Expired.grants_access());
        assert!(!Cancelled.grants_access());
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Cancelled).unwrap(), "\"cancelled\"");
    }
}
