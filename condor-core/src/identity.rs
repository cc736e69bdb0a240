//! Identity types for Condor records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for TTL and timeout values.
pub type DurationMs = u64;

/// Generate a new UUIDv7 record id (timestamp-sortable).
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of one tenant (a condominium). The unit of data isolation.
    TenantId
);

string_id!(
    /// Identifier of an authenticated principal as issued by the remote
    /// identity capability.
    UserId
);

string_id!(
    /// Identifier of a togglable UI or functional capability.
    FeatureKey
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_serializes_transparently() {
        let id = TenantId::new("cond-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"cond-1\"");

        let back: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_new_record_id_is_unique() {
        assert_ne!(new_record_id(), new_record_id());
    }
}
