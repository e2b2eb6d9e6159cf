//! Timestamp value object and billing period arithmetic.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string.
    pub fn parse_rfc3339(value: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::invalid_format("timestamp", e.to_string()))
    }

    /// Creates a timestamp from Unix seconds.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Adds a billing period. Months and years use calendar arithmetic,
    /// clamping to the last day of shorter months.
    pub fn add_period(&self, period: Period) -> Self {
        let count = period.count;
        match period.unit {
            PeriodUnit::Days => self.add_days(i64::from(count)),
            PeriodUnit::Weeks => self.add_days(i64::from(count) * 7),
            PeriodUnit::Months => self.add_calendar_months(count),
            PeriodUnit::Years => self.add_calendar_months(count.saturating_mul(12)),
        }
    }

    fn add_calendar_months(&self, months: u32) -> Self {
        self.0
            .checked_add_months(Months::new(months))
            .map(Self)
            .unwrap_or(Self(DateTime::<Utc>::MAX_UTC))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Unit of a billing or trial period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl PeriodUnit {
    /// Parses a unit by its first letter (`d`, `w`, `m`, `y`).
    ///
    /// Legacy exports spell units inconsistently ("day", "Weeks", "m"),
    /// anything unrecognised falls back to days.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('w') => PeriodUnit::Weeks,
            Some('m') => PeriodUnit::Months,
            Some('y') => PeriodUnit::Years,
            _ => PeriodUnit::Days,
        }
    }
}

/// A length of time such as "1 month" or "14 days".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub unit: PeriodUnit,
    pub count: u32,
}

impl Period {
    /// Creates a period, rejecting zero-length periods.
    pub fn new(unit: PeriodUnit, count: u32) -> Result<Self, ValidationError> {
        if count == 0 {
            return Err(ValidationError::out_of_range("period_count", 1, i32::MAX, 0));
        }
        Ok(Self { unit, count })
    }

    pub fn days(count: u32) -> Self {
        Self { unit: PeriodUnit::Days, count }
    }

    pub fn months(count: u32) -> Self {
        Self { unit: PeriodUnit::Months, count }
    }

    pub fn years(count: u32) -> Self {
        Self { unit: PeriodUnit::Years, count }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            PeriodUnit::Days => "day",
            PeriodUnit::Weeks => "week",
            PeriodUnit::Months => "month",
            PeriodUnit::Years => "year",
        };
        if self.count == 1 {
            write!(f, "1 {}", unit)
        } else {
            write!(f, "{} {}s", self.count, unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn ts(value: &str) -> Timestamp {
        Timestamp::parse_rfc3339(value).unwrap()
    }

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let now = Timestamp::now();
        let after = Utc::now();

        assert!(now.as_datetime() >= &before);
        assert!(now.as_datetime() <= &after);
    }

    #[test]
    fn timestamp_ordering_works() {
        let earlier = ts("2024-01-15T10:30:00Z");
        let later = ts("2024-01-16T10:30:00Z");

        assert!(earlier.is_before(&later));
        assert!(later.is_after(&earlier));
        assert!(earlier < later);
    }

    #[test]
    fn timestamp_serializes_to_json() {
        let json = serde_json::to_string(&ts("2024-01-15T10:30:00Z")).unwrap();
        assert!(json.contains("2024-01-15"));
    }

    #[test]
    fn unix_secs_roundtrip() {
        let value = Timestamp::from_unix_secs(1_705_276_800).unwrap();
        assert_eq!(value.as_unix_secs(), 1_705_276_800);
        assert_eq!(value.as_datetime().day(), 15);
    }

    #[test]
    fn add_month_clamps_to_end_of_shorter_month() {
        let jan_31 = ts("2024-01-31T00:00:00Z");
        let next = jan_31.add_period(Period::months(1));
        assert_eq!(next.as_datetime().month(), 2);
        assert_eq!(next.as_datetime().day(), 29);
    }

    #[test]
    fn add_year_moves_calendar_year() {
        let start = ts("2023-03-01T00:00:00Z");
        let next = start.add_period(Period::years(1));
        assert_eq!(next.as_datetime().year(), 2024);
        assert_eq!(next.as_datetime().month(), 3);
    }

    #[test]
    fn add_weeks_is_seven_days_each() {
        let start = ts("2024-01-01T00:00:00Z");
        let next = start.add_period(Period { unit: PeriodUnit::Weeks, count: 2 });
        assert_eq!(next, ts("2024-01-15T00:00:00Z"));
    }

    #[test]
    fn lenient_unit_parsing_uses_first_letter() {
        assert_eq!(PeriodUnit::parse_lenient("Weeks"), PeriodUnit::Weeks);
        assert_eq!(PeriodUnit::parse_lenient("month"), PeriodUnit::Months);
        assert_eq!(PeriodUnit::parse_lenient("y"), PeriodUnit::Years);
        assert_eq!(PeriodUnit::parse_lenient("fortnight"), PeriodUnit::Days);
        assert_eq!(PeriodUnit::parse_lenient(""), PeriodUnit::Days);
    }

    #[test]
    fn zero_length_period_is_rejected() {
        assert!(Period::new(PeriodUnit::Days, 0).is_err());
        assert!(Period::new(PeriodUnit::Days, 7).is_ok());
    }

    #[test]
    fn period_display_pluralises() {
        assert_eq!(Period::months(1).to_string(), "1 month");
        assert_eq!(Period::days(14).to_string(), "14 days");
    }
}
