//! Entity store wrapper that scopes every operation to the caller's tenant.

use super::{checks, TenantGuard, TENANT_FIELD};
use crate::executor::Executor;
use condor_core::CondorResult;
use condor_storage::{EntityStore, Filter, FilterExpr};
use serde_json::Value;
use std::sync::Arc;

/// Executor-protected, tenant-checked access to a remote [`EntityStore`].
///
/// Reads add the tenant predicate for non-admins and re-filter the results
/// locally. Writes are stamped with the caller's tenant, and updates and
/// deletes re-validate the stored record first.
#[derive(Clone)]
pub struct TenantScopedStore {
    store: Arc<dyn EntityStore>,
    executor: Executor,
    guard: TenantGuard,
}

impl TenantScopedStore {
    pub fn new(store: Arc<dyn EntityStore>, executor: Executor, guard: TenantGuard) -> Self {
        Self {
            store,
            executor,
            guard,
        }
    }

    pub async fn list(&self, entity: &str) -> CondorResult<Vec<Value>> {
        self.filter(entity, &Filter::new()).await
    }

    pub async fn filter(&self, entity: &str, filter: &Filter) -> CondorResult<Vec<Value>> {
        let ctx = self.guard.context().await?;
        let store = &self.store;
        let records = match ctx.tenant_id() {
            Some(tenant) => {
                let scoped = filter
                    .clone()
                    .without_field(TENANT_FIELD)
                    .and(FilterExpr::eq(TENANT_FIELD, tenant.as_str()));
                self.executor
                    .execute(&format!("{}.filter", entity), || store.filter(entity, &scoped))
                    .await?
            }
            None if filter.exprs().is_empty() => {
                self.executor
                    .execute(&format!("{}.list", entity), || store.list(entity))
                    .await?
            }
            None => {
                self.executor
                    .execute(&format!("{}.filter", entity), || store.filter(entity, filter))
                    .await?
            }
        };
        Ok(checks::filter_by_tenant(&ctx, records))
    }

    pub async fn get(&self, entity: &str, id: &str) -> CondorResult<Value> {
        let ctx = self.guard.context().await?;
        let record = self.fetch(entity, id).await?;
        checks::ensure_owned(&ctx, &record)?;
        Ok(record)
    }

    pub async fn create(&self, entity: &str, data: Value) -> CondorResult<Value> {
        let ctx = self.guard.context().await?;
        let data = checks::with_tenant_id(&ctx, data)?;
        let store = &self.store;
        self.executor
            .execute(&format!("{}.create", entity), || store.create(entity, data.clone()))
            .await
    }

    pub async fn update(&self, entity: &str, id: &str, patch: Value) -> CondorResult<Value> {
        let ctx = self.guard.context().await?;
        let existing = self.fetch(entity, id).await?;
        checks::ensure_owned(&ctx, &existing)?;
        let patch = if ctx.is_admin_master() {
            patch
        } else {
            checks::with_tenant_id(&ctx, patch)?
        };
        let store = &self.store;
        self.executor
            .execute(&format!("{}.update", entity), || {
                store.update(entity, id, patch.clone())
            })
            .await
    }

    pub async fn delete(&self, entity: &str, id: &str) -> CondorResult<()> {
        let ctx = self.guard.context().await?;
        let existing = self.fetch(entity, id).await?;
        checks::ensure_owned(&ctx, &existing)?;
        let store = &self.store;
        self.executor
            .execute(&format!("{}.delete", entity), || store.delete(entity, id))
            .await
    }

    async fn fetch(&self, entity: &str, id: &str) -> CondorResult<Value> {
        let store = &self.store;
        self.executor
            .execute(&format!("{}.get", entity), || store.get(entity, id))
            .await
    }
}

impl std::fmt::Debug for TenantScopedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantScopedStore")
            .field("guard", &self.guard)
            .finish()
    }
}
