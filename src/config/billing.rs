//! Billing configuration

use serde::Deserialize;
use std::time::Duration;

use crate::domain::foundation::Period;
use crate::domain::invoice::TaxLine;

use super::error::ValidationError;

const MAX_GRACE_DAYS: u32 = 90;
const MAX_TAX_BPS: u32 = 10_000;

/// Billing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// ISO-4217 currency for new invoices
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Days an unpaid renewal keeps the subscription in `pending` before expiry
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,

    /// Upper bound on a single gateway charge call
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    pub tax_name: Option<String>,

    /// Tax rate in basis points (1/100 of a percent)
    pub tax_rate_bps: Option<u32>,

    /// First invoice number handed out on a fresh install
    #[serde(default = "default_invoice_number_start")]
    pub invoice_number_start: u64,
}

impl BillingConfig {
    pub fn grace_period(&self) -> Period {
        Period::days(self.grace_period_days)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Tax applied to new invoices, if a non-zero rate is configured.
    pub fn tax_line(&self) -> Option<TaxLine> {
        match self.tax_rate_bps {
            Some(rate_bps) if rate_bps > 0 => Some(TaxLine {
                name: self.tax_name.clone().unwrap_or_else(|| "Tax".to_string()),
                rate_bps,
            }),
            _ => None,
        }
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let currency_ok =
            self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !currency_ok {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }
        if self.gateway_timeout_secs == 0 || self.gateway_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if let Some(rate) = self.tax_rate_bps {
            if rate > MAX_TAX_BPS {
                return Err(ValidationError::TaxRateTooHigh(rate));
            }
        }
        if self.grace_period_days > MAX_GRACE_DAYS {
            return Err(ValidationError::GracePeriodTooLong);
        }
        if self.invoice_number_start == 0 {
            return Err(ValidationError::InvalidInvoiceStart);
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            grace_period_days: default_grace_period_days(),
            gateway_timeout_secs: default_gateway_timeout(),
            tax_name: None,
            tax_rate_bps: None,
            invoice_number_start: default_invoice_number_start(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_grace_period_days() -> u32 {
    3
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_invoice_number_start() -> u64 {
    1
}
