//! Error types for Condor operations

use crate::{TenantId, UserType};
use thiserror::Error;

/// How the executor treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Never retried.
    Authentication,
    /// Retried with an extra penalty delay.
    Network,
    /// Retried with plain backoff.
    Other,
}

/// Failures of the remote entity and identity capabilities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Not logged in: {reason}")]
    Unauthenticated { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Remote returned status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },
}

const AUTH_MARKERS: [&str; 2] = ["not logged in", "unauthorized"];

impl RemoteError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            RemoteError::Unauthenticated { .. } => ErrorClass::Authentication,
            RemoteError::Remote { status: 401, .. } => ErrorClass::Authentication,
            RemoteError::Transport { .. } | RemoteError::Timeout { .. } => ErrorClass::Network,
            RemoteError::Remote { message, .. } | RemoteError::Forbidden { reason: message }
                if mentions_auth(message) =>
            {
                ErrorClass::Authentication
            }
            _ => ErrorClass::Other,
        }
    }
}

fn mentions_auth(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    AUTH_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Tenant isolation violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("Access denied: tenant {requested} is outside the caller's scope")]
    AccessDenied { requested: TenantId },

    #[error("Security breach: record {record_id} belongs to {found:?}, caller is scoped to {expected}")]
    SecurityBreach {
        record_id: String,
        expected: TenantId,
        found: Option<TenantId>,
    },

    #[error("Administrative writes must name a tenant")]
    MissingTenant,

    #[error("No data access for identity state {state}")]
    NoDataAccess { state: String },

    #[error("Invalid tenant context: {reason}")]
    InvalidContext { reason: String },
}

/// Permission registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("User type {user_type} may not change permissions of tenant {tenant_id}")]
    NotAdministrator {
        user_type: UserType,
        tenant_id: TenantId,
    },
}

/// Cache and local store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to encode or decode cache entry {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Key-value store failure: {reason}")]
    Store { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or CONDOR_CONFIG)")]
    MissingPath,

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read config at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Master error type for all Condor errors.
///
/// Every variant is `Clone` so that a shared in-flight future can hand the
/// same failure to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CondorError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Tenant error: {0}")]
    Tenant(#[from] TenantError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Operation {operation} was cancelled")]
    Cancelled { operation: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl CondorError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            CondorError::Remote(err) => err.classify(),
            _ => ErrorClass::Other,
        }
    }

    pub fn is_authentication(&self) -> bool {
        self.classify() == ErrorClass::Authentication
    }

    /// True for isolation failures that must never be downgraded.
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            CondorError::Tenant(TenantError::SecurityBreach { .. })
                | CondorError::Tenant(TenantError::AccessDenied { .. })
                | CondorError::Permission(PermissionError::NotAdministrator { .. })
        )
    }
}

impl From<serde_json::Error> for CondorError {
    fn from(err: serde_json::Error) -> Self {
        CondorError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for Condor operations.
pub type CondorResult<T> = Result<T, CondorError>;

// =============================================================================
// TESTS
// =============================================================================
