//! Pricing modes and trial terms for membership plans.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Period, Timestamp, ValidationError};

/// How a plan is charged and how long one payment buys access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PricingMode {
    /// No charge, perpetual access.
    Free,

    /// One payment buys access for a fixed period, then the subscription expires.
    Finite { period: Period },

    /// Charged every cycle until cancelled.
    Recurring { cycle: Period },

    /// One payment buys access between two calendar dates.
    DateRange { start: Timestamp, end: Timestamp },
}

impl PricingMode {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            PricingMode::Finite { period } | PricingMode::Recurring { cycle: period } => {
                Period::new(period.unit, period.count).map(|_| ())
            }
            PricingMode::DateRange { start, end } if !start.is_before(end) => Err(
                ValidationError::invalid_format("date_range", "start must be before end"),
            ),
            _ => Ok(()),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, PricingMode::Free)
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, PricingMode::Recurring { .. })
    }

    /// End of the access window bought by a payment starting at `from`.
    ///
    /// `None` means perpetual.
    pub fn access_end(&self, from: Timestamp) -> Option<Timestamp> {
        match self {
            PricingMode::Free => None,
            PricingMode::Finite { period } => Some(from.add_period(*period)),
            PricingMode::Recurring { cycle } => Some(from.add_period(*cycle)),
            PricingMode::DateRange { end, .. } => Some(*end),
        }
    }
}

/// Trial offered before full billing begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialTerms {
    pub enabled: bool,
    pub period: Period,
    /// Trial price in minor units; zero for a free trial.
    pub price_cents: i64,
}

impl TrialTerms {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            period: Period::days(1),
            price_cents: 0,
        }
    }

    pub fn free(period: Period) -> Self {
        Self {
            enabled: true,
            period,
            price_cents: 0,
        }
    }

    pub fn paid(period: Period, price_cents: i64) -> Self {
        Self {
            enabled: true,
            period,
            price_cents,
        }
    }
}

impl Default for TrialTerms {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PeriodUnit;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse_rfc3339(s).unwrap()
    }

    #[test]
    fn free_access_never_ends() {
        assert_eq!(PricingMode::Free.access_end(Timestamp::now()), None);
    }

    #[test]
    fn recurring_access_ends_one_cycle_later() {
        let mode = PricingMode::Recurring { cycle: Period::months(1) };
        let end = mode.access_end(ts("2024-01-15T00:00:00Z")).unwrap();
        assert_eq!(end, ts("2024-02-15T00:00:00Z"));
    }

    #[test]
    fn date_range_ends_at_fixed_date_regardless_of_start() {
        let mode = PricingMode::DateRange {
            start: ts("2024-01-01T00:00:00Z"),
            end: ts("2024-06-30T00:00:00Z"),
        };
        assert_eq!(
            mode.access_end(ts("2024-03-01T00:00:00Z")),
            Some(ts("2024-06-30T00:00:00Z"))
        );
    }

    #[test]
    fn inverted_date_range_is_invalid() {
        let mode = PricingMode::DateRange {
            start: ts("2024-06-30T00:00:00Z"),
            end: ts("2024-01-01T00:00:00Z"),
        };
        assert!(mode.validate().is_err());
    }

    #[test]
    fn zero_length_cycle_is_invalid() {
        let mode = PricingMode::Recurring {
            cycle: Period { unit: PeriodUnit::Months, count: 0 },
        };
        assert!(mode.validate().is_err());
    }

    #[test]
    fn pricing_mode_serializes_with_tag() {
        let json = serde_json::to_value(PricingMode::Recurring { cycle: Period::years(1) }).unwrap();
        assert_eq!(json["mode"], "recurring");
        assert_eq!(json["cycle"]["unit"], "years");
    }
}
