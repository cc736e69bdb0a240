//! Condor Core - Identity and Tenant Types
//!
//! Pure data structures shared by every Condor crate: typed ids, role enums,
//! resolved identity states, tenant contexts, permission maps, the error
//! taxonomy and policy sections. No I/O happens here.

mod clock;
mod config;
mod entities;
mod enums;
mod error;
mod identity;
mod permission;
mod role;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheTtlConfig, CoalesceConfig, EntityNames, PermissionConfig, RetryConfig};
pub use entities::{MembershipRecord, Principal};
pub use enums::{GlobalRole, MembershipStatus, ParseEnumError, Profile, UserType};
pub use error::{
    CacheError, CondorError, CondorResult, ConfigError, ErrorClass, PermissionError, RemoteError,
    TenantError,
};
pub use identity::{new_record_id, DurationMs, FeatureKey, TenantId, Timestamp, UserId};
pub use permission::{
    AuditAction, AuditEntry, PermissionMap, TenantSettings, PERMISSION_HISTORY_LIMIT,
};
pub use role::{codes, Access, AuthenticatedIdentity, IdentityRole, TenantContext};
