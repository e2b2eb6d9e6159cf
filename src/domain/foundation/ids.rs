//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Declares a uuid-backed identifier with the usual constructors.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

/// Declares a non-empty string identifier.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning error if empty.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a membership plan.
    MembershipId
);

uuid_id!(
    /// Unique identifier for a member's subscription to a plan.
    SubscriptionId
);

uuid_id!(
    /// Unique identifier for an invoice.
    InvoiceId
);

string_id!(
    /// Member identifier (opaque user id owned by the host system).
    MemberId,
    "member_id"
);

string_id!(
    /// Identifier of a protected content item (post id, page slug, url, ...).
    ContentId,
    "content_id"
);

string_id!(
    /// Identifier of a payment gateway (`free`, `manual`, `card`, ...).
    GatewayId,
    "gateway_id"
);

impl GatewayId {
    /// Identifier for a gateway's built-in constant name.
    pub fn known(id: &'static str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_ids_are_unique() {
        assert_ne!(MembershipId::new(), MembershipId::new());
    }

    #[test]
    fn subscription_id_parses_from_display() {
        let id = SubscriptionId::new();
        let parsed: SubscriptionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invoice_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<InvoiceId>().is_err());
    }

    #[test]
    fn member_id_rejects_empty() {
        assert!(MemberId::new("").is_err());
        assert!(MemberId::new("   ").is_err());
        assert_eq!(MemberId::new("user-42").unwrap().as_str(), "user-42");
    }

    #[test]
    fn content_id_serializes_transparently() {
        let id = ContentId::new("post-17").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"post-17\"");
    }

    #[test]
    fn gateway_id_displays_inner_value() {
        let id = GatewayId::new("manual").unwrap();
        assert_eq!(id.to_string(), "manual");
    }
}
