//! Access handlers.

mod check_access;

pub use check_access::{CheckAccessHandler, CheckAccessQuery};
