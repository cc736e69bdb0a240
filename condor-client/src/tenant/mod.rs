//! Tenant context derivation and enforcement.
//!
//! [`TenantGuard`] turns the resolved identity into a [`TenantContext`] and
//! caches it next to the identity. The checks in [`checks`] apply that
//! context to individual records, and [`TenantScopedStore`] applies them to
//! every operation of a remote entity store.

pub mod checks;
mod scoped;
mod store;

pub use checks::{ensure_owned, filter_by_tenant, validate_access, with_tenant_id};
pub use scoped::{TenantScoped, LEGACY_TENANT_FIELDS, TENANT_FIELD};
pub use store::TenantScopedStore;

use crate::identity::{IdentityResolver, TENANT_CONTEXT_CACHE_KEY};
use condor_core::{CondorResult, TenantContext, TenantId};
use condor_storage::Tiers;
use std::time::Duration;

/// Derives and caches the caller's tenant context.
#[derive(Debug, Clone)]
pub struct TenantGuard {
    resolver: IdentityResolver,
    ttl: Duration,
}

impl TenantGuard {
    pub fn new(resolver: IdentityResolver, ttl: Duration) -> Self {
        Self { resolver, ttl }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Context of the current caller. Fails with `TenantError::NoDataAccess`
    /// for any identity state without data access.
    pub async fn context(&self) -> CondorResult<TenantContext> {
        let cache = self.resolver.cache();
        if let Some(ctx) = cache.get::<TenantContext>(TENANT_CONTEXT_CACHE_KEY, Tiers::Both) {
            return Ok(ctx);
        }

        let role = self.resolver.resolve(false).await;
        let ctx = TenantContext::from_identity(&role)?;
        if let Err(err) = cache.set(TENANT_CONTEXT_CACHE_KEY, &ctx, self.ttl, Tiers::Both) {
            tracing::warn!(error = %err, "Failed to cache tenant context");
        }
        tracing::debug!(
            user_id = %ctx.user_id(),
            tenant_id = ?ctx.tenant_id(),
            admin = ctx.is_admin_master(),
            "Tenant context derived"
        );
        Ok(ctx)
    }

    pub async fn validate_access(&self, target: &TenantId) -> CondorResult<()> {
        let ctx = self.context().await?;
        Ok(validate_access(&ctx, target)?)
    }

    pub async fn filter_by_tenant<T: TenantScoped>(&self, items: Vec<T>) -> CondorResult<Vec<T>> {
        let ctx = self.context().await?;
        Ok(filter_by_tenant(&ctx, items))
    }

    pub async fn with_tenant_id<T: TenantScoped>(&self, data: T) -> CondorResult<T> {
        let ctx = self.context().await?;
        Ok(with_tenant_id(&ctx, data)?)
    }

    pub async fn ensure_owned<T: TenantScoped>(&self, existing: &T) -> CondorResult<()> {
        let ctx = self.context().await?;
        Ok(ensure_owned(&ctx, existing)?)
    }
}
