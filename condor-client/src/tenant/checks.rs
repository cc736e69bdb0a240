//! Tenant isolation checks applied to every entity read and write.
//!
//! A global administrator is exempt from every check. Each exemption is
//! logged at `debug` so that admin access stays traceable.

use super::TenantScoped;
use condor_core::{TenantContext, TenantError, TenantId};

/// Passes when `target` is the caller's tenant.
pub fn validate_access(ctx: &TenantContext, target: &TenantId) -> Result<(), TenantError> {
    if ctx.is_admin_master() {
        tracing::debug!(user_id = %ctx.user_id(), tenant_id = %target, "Admin exempt from tenant access check");
        return Ok(());
    }
    if ctx.tenant_id() == Some(target) {
        return Ok(());
    }
    tracing::warn!(
        user_id = %ctx.user_id(),
        tenant_id = ?ctx.tenant_id(),
        requested = %target,
        "Cross-tenant access denied"
    );
    Err(TenantError::AccessDenied {
        requested: target.clone(),
    })
}

/// Keep only items owned by the caller's tenant.
pub fn filter_by_tenant<T: TenantScoped>(ctx: &TenantContext, items: Vec<T>) -> Vec<T> {
    let Some(tenant) = ctx.tenant_id() else {
        tracing::debug!(user_id = %ctx.user_id(), "Admin exempt from tenant filtering");
        return items;
    };
    let total = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter(|item| item.tenant_id().as_ref() == Some(tenant))
        .collect();
    if kept.len() != total {
        tracing::warn!(
            tenant_id = %tenant,
            dropped = total - kept.len(),
            "Dropped records outside the caller's tenant"
        );
    }
    kept
}

/// Stamp the caller's tenant onto `data`. Non-admins always get their own
/// tenant, whatever the payload claims. Admins must name a tenant.
pub fn with_tenant_id<T: TenantScoped>(ctx: &TenantContext, mut data: T) -> Result<T, TenantError> {
    match ctx.tenant_id() {
        Some(tenant) => {
            if let Some(claimed) = data.tenant_id() {
                if &claimed != tenant {
                    tracing::warn!(
                        tenant_id = %tenant,
                        claimed = %claimed,
                        "Overwriting foreign tenant on write payload"
                    );
                }
            }
            data.set_tenant_id(tenant.clone());
            Ok(data)
        }
        None => {
            if data.tenant_id().is_none() {
                return Err(TenantError::MissingTenant);
            }
            tracing::debug!(user_id = %ctx.user_id(), "Admin write keeps supplied tenant");
            Ok(data)
        }
    }
}

/// Re-check a pre-existing record before it is updated or deleted.
pub fn ensure_owned<T: TenantScoped>(ctx: &TenantContext, existing: &T) -> Result<(), TenantError> {
    let Some(expected) = ctx.tenant_id() else {
        tracing::debug!(user_id = %ctx.user_id(), "Admin exempt from ownership check");
        return Ok(());
    };
    let found = existing.tenant_id();
    if found.as_ref() == Some(expected) {
        return Ok(());
    }
    let record_id = existing.record_id().unwrap_or_else(|| "<unknown>".to_string());
    tracing::error!(
        user_id = %ctx.user_id(),
        tenant_id = %expected,
        found = ?found,
        record_id = %record_id,
        "Security breach: record outside caller's tenant"
    );
    Err(TenantError::SecurityBreach {
        record_id,
        expected: expected.clone(),
        found,
    })
}
