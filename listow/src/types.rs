//! Common type definitions.
//!
//! Entity IDs are `BIGSERIAL` columns exposed as plain integers, so clients that fabricate
//! temporary ids while offline (derived from the current time) stay in the same id space.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

// Type aliases for IDs
pub type UserId = i64;
pub type ListId = i64;
pub type ItemId = i64;
pub type CollaboratorId = i64;

/// Permission granted to a collaborator on a shared list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "collaborator_permission", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorPermission {
    #[default]
    Read,
    Write,
}

impl fmt::Display for CollaboratorPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollaboratorPermission::Read => write!(f, "read"),
            CollaboratorPermission::Write => write!(f, "write"),
        }
    }
}

/// Normalize an email address for storage and lookup: surrounding whitespace is dropped and
/// the address is lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trim an optional text field; blank values become `None`.
pub fn trim_optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
        assert_eq!(normalize_email("a@x.com"), "a@x.com");
    }

    #[test]
    fn test_trim_optional() {
        assert_eq!(trim_optional(Some("  milk ")), Some("milk".to_string()));
        assert_eq!(trim_optional(Some("   ")), None);
        assert_eq!(trim_optional(None), None);
    }

    #[test]
    fn test_permission_serialization() {
        assert_eq!(serde_json::to_string(&CollaboratorPermission::Write).unwrap(), "\"write\"");
        let parsed: CollaboratorPermission = serde_json::from_str("\"read\"").unwrap();
        assert_eq!(parsed, CollaboratorPermission::Read);
        assert_eq!(CollaboratorPermission::default(), CollaboratorPermission::Read);
    }
}
