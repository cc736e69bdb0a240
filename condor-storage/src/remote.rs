//! Remote capabilities consumed by the Condor core.
//!
//! Neither capability is assumed to be tenant-safe: callers scope every
//! entity operation themselves.

use crate::Filter;
use ::async_trait::async_trait;
use condor_core::{CondorResult, Principal};
use serde_json::Value;

/// Generic entity read/write capability.
///
/// Records are JSON objects carrying at least an `id` field once persisted.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// List every record of an entity.
    async fn list(&self, entity: &str) -> CondorResult<Vec<Value>>;

    /// List records matching every expression of `filter`.
    async fn filter(&self, entity: &str, filter: &Filter) -> CondorResult<Vec<Value>>;

    /// Fetch one record. A missing record is `RemoteError::NotFound`.
    async fn get(&self, entity: &str, id: &str) -> CondorResult<Value>;

    /// Create a record and return it as stored.
    async fn create(&self, entity: &str, data: Value) -> CondorResult<Value>;

    /// Merge `patch` into an existing record and return the result.
    async fn update(&self, entity: &str, id: &str, patch: Value) -> CondorResult<Value>;

    async fn delete(&self, entity: &str, id: &str) -> CondorResult<()>;
}

/// Current-identity capability.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The authenticated principal, or `RemoteError::Unauthenticated`.
    async fn who_am_i(&self) -> CondorResult<Principal>;

    async fn sign_out(&self) -> CondorResult<()>;
}

/// Record id of a JSON record, if present.
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}
