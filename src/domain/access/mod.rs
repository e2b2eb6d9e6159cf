//! Access rule engine.
//!
//! # Module Structure
//!
//! - `rule_type` - Closed set of rule types and their policy table
//! - `rule_set` - Per-membership allow/deny list with deny-wins merge
//! - `evaluator` - Cross-membership access decision (allow wins)
//! - `events` - Access denied event

mod evaluator;
mod events;
mod rule_set;
mod rule_type;

pub use evaluator::{AccessEvaluator, AccessSnapshot, Decision, DecisionReason};
pub use events::AccessDenied;
pub use rule_set::RuleSet;
pub use rule_type::{Access, MatchStrategy, RulePolicy, RuleType};
