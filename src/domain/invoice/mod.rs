//! Invoices and discounts.
//!
//! # Module Structure
//!
//! - `aggregate` - Invoice aggregate with derived total
//! - `status` - InvoiceStatus state machine
//! - `discount` - DiscountCalculator extension point and coupon book
//! - `events` - Invoice settled event

mod aggregate;
mod discount;
mod events;
mod status;

pub use aggregate::{Invoice, TaxLine};
pub use discount::{AppliedDiscount, Coupon, CouponBook, CouponValue, DiscountCalculator, NoDiscount};
pub use events::InvoiceSettled;
pub use status::InvoiceStatus;
