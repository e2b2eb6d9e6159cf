//! Import document format.
//!
//! A JSON export of another membership installation. Money is given in
//! major currency units and dates as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or
//! RFC 3339, the way legacy exports write them; conversion to the engine's
//! types happens here so the handler only sees validated values.

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{Period, PeriodUnit, Timestamp};
use crate::domain::membership::{PricingMode, SpecialMembership, TrialTerms};

use super::ImportError;

/// Top-level sections every document must carry.
const REQUIRED_SECTIONS: [&str; 7] = [
    "source",
    "plugin_version",
    "export_time",
    "notes",
    "memberships",
    "members",
    "settings",
];

/// A parsed import document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDocument {
    pub source: String,
    pub plugin_version: String,
    pub export_time: String,
    pub notes: Vec<String>,
    pub memberships: Vec<MembershipRecord>,
    pub members: Vec<MemberRecord>,
    /// Installation settings. Kept for the report; the engine has none to apply.
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl ImportDocument {
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ImportError::InvalidDocument(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validates the top-level shape before deserializing the records.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ImportError> {
        let Some(object) = value.as_object() else {
            return Err(ImportError::InvalidDocument(
                "document must be a JSON object".to_string(),
            ));
        };
        let missing: Vec<&str> = REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|section| !object.contains_key(*section))
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingSections(missing.join(", ")));
        }

        serde_json::from_value(value).map_err(|e| ImportError::InvalidDocument(e.to_string()))
    }
}

/// An exported membership plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `simple`, `tier`, `dripped` or `content_type`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Source id of the parent plan for tier children.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub free: bool,
    #[serde(default)]
    pub special: Option<String>,
    /// `permanent`, `finite`, `recurring` or `date-range`.
    #[serde(default)]
    pub pay_type: Option<String>,
    #[serde(default)]
    pub period_unit: Option<u32>,
    #[serde(default)]
    pub period_type: Option<String>,
    #[serde(default)]
    pub period_start: Option<String>,
    #[serde(default)]
    pub period_end: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub trial: bool,
    #[serde(default)]
    pub trial_price: Option<f64>,
    #[serde(default)]
    pub trial_period_unit: Option<u32>,
    #[serde(default)]
    pub trial_period_type: Option<String>,
}

impl MembershipRecord {
    /// The reserved plan this record stands for, if any.
    pub fn special_kind(&self) -> Option<SpecialMembership> {
        match self.special.as_deref().map(str::trim) {
            None | Some("") => None,
            Some("guest") => Some(SpecialMembership::Guest),
            Some(_) => Some(SpecialMembership::BaseProtectedContent),
        }
    }

    pub fn pricing(&self) -> Result<PricingMode, String> {
        if self.free {
            return Ok(PricingMode::Free);
        }
        let pay_type = self.pay_type.as_deref().unwrap_or("permanent");
        match pay_type {
            "finite" => Ok(PricingMode::Finite {
                period: period(self.period_unit, self.period_type.as_deref())?,
            }),
            "recurring" => Ok(PricingMode::Recurring {
                cycle: period(self.period_unit, self.period_type.as_deref())?,
            }),
            "date-range" | "date_range" => {
                let start = required_date("period_start", self.period_start.as_deref())?;
                let end = required_date("period_end", self.period_end.as_deref())?;
                Ok(PricingMode::DateRange { start, end })
            }
            "permanent" if self.price.unwrap_or(0.0) == 0.0 => Ok(PricingMode::Free),
            "permanent" => Err("priced permanent plans have no pricing mode here".to_string()),
            other => Err(format!("unknown pay_type '{}'", other)),
        }
    }

    pub fn price_cents(&self) -> Result<i64, String> {
        if self.free {
            return Ok(0);
        }
        self.price.map(to_cents).transpose().map(|c| c.unwrap_or(0))
    }

    pub fn trial_terms(&self) -> Result<TrialTerms, String> {
        if !self.trial {
            return Ok(TrialTerms::disabled());
        }
        let period = period(self.trial_period_unit, self.trial_period_type.as_deref())?;
        let price = self.trial_price.map(to_cents).transpose()?.unwrap_or(0);
        Ok(if price == 0 {
            TrialTerms::free(period)
        } else {
            TrialTerms::paid(period, price)
        })
    }
}

/// An exported member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Members are matched to host users by email.
    pub email: String,
    /// Stored payment data keyed by gateway id.
    #[serde(default)]
    pub payment: BTreeMap<String, PaymentRecord>,
    #[serde(default)]
    pub subscriptions: Vec<RegistrationRecord>,
}

impl MemberRecord {
    pub fn label(&self) -> String {
        match &self.username {
            Some(username) => format!("{} ({})", username, self.email),
            None => self.email.clone(),
        }
    }
}

/// Tokenised payment data for one gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Customer or profile reference at the gateway.
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub card_brand: Option<String>,
    /// Masked card number; only the last four digits are kept.
    #[serde(default)]
    pub card_num: Option<String>,
    /// `MM/YYYY` or `MM/YY`.
    #[serde(default)]
    pub card_exp: Option<String>,
}

impl PaymentRecord {
    pub fn last4(&self) -> Option<String> {
        let digits: String = self
            .card_num
            .as_deref()?
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        (digits.len() >= 4).then(|| digits[digits.len() - 4..].to_string())
    }

    pub fn expiry(&self) -> Option<(u32, u32)> {
        let (month, year) = self.card_exp.as_deref()?.split_once('/')?;
        let month: u32 = month.trim().parse().ok()?;
        let year: u32 = year.trim().parse().ok()?;
        let year = if year < 100 { 2000 + year } else { year };
        Some((month, year))
    }
}

/// An exported subscription of one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub id: String,
    /// Source id of the membership.
    pub membership: String,
    /// `pending`, `trial`, `active`, `expired`, `cancelled` (or `deactivated`).
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub expire: Option<String>,
    #[serde(default)]
    pub trial_end: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub invoices: Vec<InvoiceRecord>,
}

/// An exported invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub invoice_number: u64,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    /// `pending`, `paid`, `failed` or `refunded`.
    pub status: String,
    #[serde(default)]
    pub coupon: Option<String>,
    pub currency: String,
    pub amount: f64,
    #[serde(default)]
    pub discount: f64,
    /// Pro-rated credit.
    #[serde(default, rename = "discount2")]
    pub pro_rate: f64,
    /// Total as recorded by the source. Recomputed on import.
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub for_trial: bool,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Percent, e.g. `7.5`.
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub tax_name: Option<String>,
}

fn default_true() -> bool {
    true
}

fn period(count: Option<u32>, unit: Option<&str>) -> Result<Period, String> {
    let unit = unit.map(PeriodUnit::parse_lenient).unwrap_or(PeriodUnit::Days);
    Period::new(unit, count.unwrap_or(1)).map_err(|e| e.to_string())
}

fn required_date(field: &str, value: Option<&str>) -> Result<Timestamp, String> {
    let value = value.ok_or_else(|| format!("{} is required", field))?;
    parse_date(value).ok_or_else(|| format!("{} '{}' is not a date", field, value))
}

/// Converts a major-unit amount to cents.
pub(crate) fn to_cents(amount: f64) -> Result<i64, String> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("invalid amount {}", amount));
    }
    Ok((amount * 100.0).round() as i64)
}

/// Converts a percentage to basis points.
pub(crate) fn to_bps(percent: f64) -> Result<u32, String> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(format!("invalid tax rate {}", percent));
    }
    Ok((percent * 100.0).round() as u32)
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` (as UTC midnight).
pub(crate) fn parse_date(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(ts) = Timestamp::parse_rfc3339(value) {
        return Some(ts);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Timestamp::from_datetime(Utc.from_utc_datetime(&naive)));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Timestamp::from_datetime(Utc.from_utc_datetime(&midnight)))
}
