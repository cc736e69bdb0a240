//! Role-based feature gating per tenant.
//!
//! Maps each profile to the set of features it may see. Reads are local and
//! synchronous; writes are administrative, audited, and announced through
//! [`VersionBroadcast`] so other registries of the same tenant can reload.

mod broadcast;
mod poller;
mod registry;

pub use broadcast::{PermissionsUpdated, VersionBroadcast};
pub use poller::spawn_version_poller;
pub use registry::{PermissionRegistry, RegistryDeps};
