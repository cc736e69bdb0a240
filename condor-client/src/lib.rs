//! Condor Client - Identity, Tenancy and Permissions
//!
//! Resilient remote calls, identity resolution with caching and call
//! coalescing, tenant isolation over a generic entity store, and
//! per-tenant feature permissions kept in step across sessions.

pub mod api_client;
pub mod config;
pub mod executor;
pub mod identity;
pub mod load;
pub mod login;
pub mod permissions;
pub mod services;
pub mod single_flight;
pub mod telemetry;
pub mod tenant;

pub use api_client::RestClient;
pub use config::{ClientConfig, LogFormat, LoggingConfig, RemoteConfig, StorageConfig};
pub use executor::Executor;
pub use identity::{IdentityResolver, ResolverDeps, ResolverPhase};
pub use load::LoadScope;
pub use login::{LoginRedirect, RecordingLoginRedirect, TracingLoginRedirect};
pub use permissions::{PermissionRegistry, PermissionsUpdated, RegistryDeps, VersionBroadcast};
pub use services::{Capabilities, CoreServices, Policy};
pub use single_flight::SingleFlight;
pub use tenant::{TenantGuard, TenantScoped, TenantScopedStore};
