//! Closed set of content categories a rule can target.
//!
//! Each rule type carries a policy selected from a static table: the default
//! applied when no explicit entry exists, and how a stored rule key is matched
//! against a requested content id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ContentId, ValidationError};

/// Allow/deny outcome of a rule or decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn is_allow(&self) -> bool {
        matches!(self, Access::Allow)
    }

    /// Combines two outcomes where deny takes precedence.
    pub fn deny_wins(self, other: Access) -> Access {
        if self == Access::Deny || other == Access::Deny {
            Access::Deny
        } else {
            Access::Allow
        }
    }
}

/// Category of protectable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Posts,
    Pages,
    Categories,
    Menus,
    Media,
    Comments,
    Shortcodes,
    Urls,
}

/// How a stored rule key is compared with a requested content id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Key and content id must be identical.
    Exact,
    /// Key matches any content id that starts with it.
    Prefix,
}

impl MatchStrategy {
    pub fn matches(&self, key: &ContentId, content_id: &ContentId) -> bool {
        match self {
            MatchStrategy::Exact => key == content_id,
            MatchStrategy::Prefix => content_id.as_str().starts_with(key.as_str()),
        }
    }
}

/// Behaviour attached to a rule type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulePolicy {
    pub default_access: Access,
    pub matching: MatchStrategy,
}

const fn policy(default_access: Access, matching: MatchStrategy) -> RulePolicy {
    RulePolicy {
        default_access,
        matching,
    }
}

/// Indexed by `RuleType as usize`; order must follow the enum declaration.
static POLICIES: [RulePolicy; 8] = [
    policy(Access::Deny, MatchStrategy::Exact),  // Posts
    policy(Access::Deny, MatchStrategy::Exact),  // Pages
    policy(Access::Deny, MatchStrategy::Exact),  // Categories
    policy(Access::Allow, MatchStrategy::Exact), // Menus
    policy(Access::Deny, MatchStrategy::Exact),  // Media
    policy(Access::Allow, MatchStrategy::Exact), // Comments
    policy(Access::Deny, MatchStrategy::Exact),  // Shortcodes
    policy(Access::Deny, MatchStrategy::Prefix), // Urls
];

impl RuleType {
    pub const ALL: [RuleType; 8] = [
        RuleType::Posts,
        RuleType::Pages,
        RuleType::Categories,
        RuleType::Menus,
        RuleType::Media,
        RuleType::Comments,
        RuleType::Shortcodes,
        RuleType::Urls,
    ];

    pub fn policy(&self) -> &'static RulePolicy {
        &POLICIES[*self as usize]
    }

    pub fn default_access(&self) -> Access {
        self.policy().default_access
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Posts => "posts",
            RuleType::Pages => "pages",
            RuleType::Categories => "categories",
            RuleType::Menus => "menus",
            RuleType::Media => "media",
            RuleType::Comments => "comments",
            RuleType::Shortcodes => "shortcodes",
            RuleType::Urls => "urls",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleType::ALL
            .iter()
            .copied()
            .find(|rt| rt.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| ValidationError::invalid_format("rule_type", format!("unknown rule type '{}'", s)))
    }
}
