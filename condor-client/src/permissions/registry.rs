//! Per-tenant permission registry.
//!
//! Reads are synchronous and served from a local copy of the map, seeded
//! from the durable local store so the first paint needs no network. Writes
//! re-read the remote settings record, merge one pair, and write the whole
//! record back.

use super::broadcast::{PermissionsUpdated, VersionBroadcast};
use crate::executor::Executor;
use crate::tenant::{validate_access, TENANT_FIELD};
use condor_core::{
    AuditEntry, Clock, CondorError, CondorResult, FeatureKey, PermissionError, PermissionMap,
    Profile, TenantContext, TenantId, TenantSettings, UserType,
};
use condor_storage::{record_id, EntityStore, Filter, FilterExpr, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalPermissions {
    permissions: PermissionMap,
    version: u64,
}

struct RegistryInner {
    tenant_id: TenantId,
    store: Arc<dyn EntityStore>,
    executor: Executor,
    local: Arc<dyn KeyValueStore>,
    settings_entity: String,
    clock: Arc<dyn Clock>,
    broadcast: VersionBroadcast,
    state: RwLock<LocalPermissions>,
    write_lock: tokio::sync::Mutex<()>,
}

/// Collaborators of a [`PermissionRegistry`].
pub struct RegistryDeps {
    pub store: Arc<dyn EntityStore>,
    pub executor: Executor,
    pub local: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub broadcast: VersionBroadcast,
}

/// Feature toggles of one tenant. Clones share state.
#[derive(Clone)]
pub struct PermissionRegistry {
    inner: Arc<RegistryInner>,
}

impl PermissionRegistry {
    /// Build the registry and seed it from the local store.
    pub fn new(tenant_id: TenantId, settings_entity: impl Into<String>, deps: RegistryDeps) -> Self {
        let registry = Self {
            inner: Arc::new(RegistryInner {
                tenant_id,
                store: deps.store,
                executor: deps.executor,
                local: deps.local,
                settings_entity: settings_entity.into(),
                clock: deps.clock,
                broadcast: deps.broadcast,
                state: RwLock::new(LocalPermissions::default()),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        };
        registry.load_local();
        registry
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.inner.tenant_id
    }

    pub fn broadcast(&self) -> &VersionBroadcast {
        &self.inner.broadcast
    }

    /// Whether `profile` may see `feature`. Never blocks on I/O; absent
    /// entries are enabled.
    pub fn is_feature_enabled(&self, profile: Profile, feature: &FeatureKey) -> bool {
        self.read_state().permissions.is_enabled(profile, feature)
    }

    /// Like [`is_feature_enabled`](Self::is_feature_enabled) for a user type.
    /// A global administrator sees everything.
    pub fn is_enabled_for(&self, user_type: UserType, feature: &FeatureKey) -> bool {
        match user_type.profile() {
            Some(profile) => self.is_feature_enabled(profile, feature),
            None => true,
        }
    }

    pub fn version(&self) -> u64 {
        self.read_state().version
    }

    pub fn snapshot(&self) -> PermissionMap {
        self.read_state().permissions.clone()
    }

    /// Replace the in-memory map with the locally persisted copy.
    /// Returns false when nothing usable is stored.
    pub fn load_local(&self) -> bool {
        let key = self.local_key();
        let raw = match self.inner.local.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(tenant_id = %self.inner.tenant_id, error = %err, "Failed to read local permissions");
                return false;
            }
        };
        match serde_json::from_str::<LocalPermissions>(&raw) {
            Ok(local) => {
                tracing::debug!(
                    tenant_id = %self.inner.tenant_id,
                    version = local.version,
                    "Loaded local permissions"
                );
                *self.write_state() = local;
                true
            }
            Err(err) => {
                tracing::warn!(tenant_id = %self.inner.tenant_id, error = %err, "Discarding unreadable local permissions");
                false
            }
        }
    }

    /// Pull the settings record and adopt its map. Returns the new version.
    pub async fn refresh(&self) -> CondorResult<u64> {
        let settings = self.fetch_settings().await?;
        let version = settings.permissions_version;
        self.adopt(settings.permissions, version);
        tracing::debug!(tenant_id = %self.inner.tenant_id, version = version, "Permissions refreshed");
        Ok(version)
    }

    /// Set one `profile`/`feature` pair for this tenant.
    ///
    /// Requires an administrative caller of this tenant (or a global
    /// administrator). The settings record is re-read right before the merge
    /// so that concurrent edits to other pairs survive.
    pub async fn set_feature(
        &self,
        ctx: &TenantContext,
        profile: Profile,
        feature: FeatureKey,
        enabled: bool,
    ) -> CondorResult<AuditEntry> {
        if !ctx.user_type().is_administrative() {
            tracing::warn!(
                user_id = %ctx.user_id(),
                user_type = %ctx.user_type(),
                tenant_id = %self.inner.tenant_id,
                "Permission change refused"
            );
            return Err(PermissionError::NotAdministrator {
                user_type: ctx.user_type(),
                tenant_id: self.inner.tenant_id.clone(),
            }
            .into());
        }
        validate_access(ctx, &self.inner.tenant_id)?;

        let _serialised = self.inner.write_lock.lock().await;

        let mut settings = self.fetch_settings().await?;
        let entry = settings.apply_toggle(
            ctx.user_id().clone(),
            profile,
            feature,
            enabled,
            self.inner.clock.now(),
        );
        let version = settings.permissions_version;
        let permissions = settings.permissions.clone();
        self.persist_settings(settings).await?;

        self.adopt(permissions, version);
        self.inner.broadcast.publish(PermissionsUpdated {
            tenant_id: self.inner.tenant_id.clone(),
            version,
        });
        tracing::info!(
            tenant_id = %self.inner.tenant_id,
            user_id = %ctx.user_id(),
            profile = %profile,
            feature = %entry.feature,
            enabled = enabled,
            version = version,
            "Permission changed"
        );
        Ok(entry)
    }

    async fn fetch_settings(&self) -> CondorResult<TenantSettings> {
        let store = &self.inner.store;
        let entity = self.inner.settings_entity.as_str();
        let filter = Filter::from(FilterExpr::eq(TENANT_FIELD, self.inner.tenant_id.as_str()));
        let records = self
            .inner
            .executor
            .execute("settings.fetch", || store.filter(entity, &filter))
            .await?;

        let mut best: Option<TenantSettings> = None;
        for record in records {
            let id = record_id(&record).map(str::to_string);
            let mut settings = match serde_json::from_value::<TenantSettings>(record) {
                Ok(settings) => settings,
                Err(err) => {
                    tracing::warn!(
                        tenant_id = %self.inner.tenant_id,
                        record_id = ?id,
                        error = %err,
                        "Skipping unreadable settings record"
                    );
                    continue;
                }
            };
            if settings.tenant_id != self.inner.tenant_id {
                continue;
            }
            settings.id = settings.id.or(id);
            let newer = best
                .as_ref()
                .map_or(true, |current| settings.permissions_version > current.permissions_version);
            if newer {
                best = Some(settings);
            }
        }
        Ok(best.unwrap_or_else(|| TenantSettings::new(self.inner.tenant_id.clone())))
    }

    async fn persist_settings(&self, settings: TenantSettings) -> CondorResult<()> {
        let store = &self.inner.store;
        let entity = self.inner.settings_entity.as_str();
        let id = settings.id.clone();
        let body = serde_json::to_value(&settings)?;
        match id {
            Some(id) => {
                self.inner
                    .executor
                    .execute("settings.update", || store.update(entity, &id, body.clone()))
                    .await?;
            }
            None => {
                self.inner
                    .executor
                    .execute("settings.create", || store.create(entity, body.clone()))
                    .await?;
            }
        }
        Ok(())
    }

    fn adopt(&self, permissions: PermissionMap, version: u64) {
        let local = LocalPermissions {
            permissions,
            version,
        };
        match serde_json::to_string(&local) {
            Ok(encoded) => {
                if let Err(err) = self.inner.local.set(&self.local_key(), &encoded) {
                    tracing::warn!(tenant_id = %self.inner.tenant_id, error = %err, "Failed to persist local permissions");
                }
            }
            Err(err) => {
                tracing::warn!(
                    tenant_id = %self.inner.tenant_id,
                    error = %CondorError::from(err),
                    "Failed to encode local permissions"
                );
            }
        }
        *self.write_state() = local;
    }

    fn local_key(&self) -> String {
        format!("permissions:{}", self.inner.tenant_id)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, LocalPermissions> {
        self.inner.state.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, LocalPermissions> {
        self.inner.state.write().unwrap_or_else(|err| err.into_inner())
    }
}

impl std::fmt::Debug for PermissionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionRegistry")
            .field("tenant_id", &self.inner.tenant_id)
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor_core::{ManualClock, TenantError, UserId};
    use condor_storage::{InMemoryKeyValueStore, MockRemote};
    use serde_json::json;

    fn registry(remote: &MockRemote, local: &InMemoryKeyValueStore) -> PermissionRegistry {
        let local: Arc<dyn KeyValueStore> = Arc::new(local.clone());
        PermissionRegistry::new(
            TenantId::new("A"),
            "TenantSettings",
            RegistryDeps {
                store: Arc::new(remote.clone()),
                executor: Executor::new(condor_core::RetryConfig::immediate(1)),
                local: Arc::clone(&local),
                clock: Arc::new(ManualClock::fixed()),
                broadcast: VersionBroadcast::new(local, 8),
            },
        )
    }

    fn sindico(tenant: &str) -> TenantContext {
        TenantContext::member(UserId::new("s1"), TenantId::new(tenant), UserType::Sindico)
    }

    #[tokio::test]
    async fn test_defaults_to_enabled_without_settings() {
        let registry = registry(&MockRemote::new(), &InMemoryKeyValueStore::new());
        assert!(registry.is_feature_enabled(Profile::Morador, &FeatureKey::new("marketplace")));
        assert_eq!(registry.refresh().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_feature_creates_then_updates_record() {
        let remote = MockRemote::new();
        let registry = registry(&remote, &InMemoryKeyValueStore::new());
        let ctx = sindico("A");

        registry
            .set_feature(&ctx, Profile::Porteiro, FeatureKey::new("chamados_portaria"), false)
            .await
            .unwrap();
        registry
            .set_feature(&ctx, Profile::Morador, FeatureKey::new("marketplace"), false)
            .await
            .unwrap();

        let stored = remote.records("TenantSettings");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["permissions"]["porteiro"]["chamados_portaria"], false);
        assert_eq!(stored[0]["permissions"]["morador"]["marketplace"], false);
        assert_eq!(stored[0]["permissions_version"], 2);
        assert_eq!(registry.version(), 2);
        assert!(!registry.is_feature_enabled(Profile::Morador, &FeatureKey::new("marketplace")));
    }

    #[tokio::test]
    async fn test_non_administrative_caller_is_refused() {
        let registry = registry(&MockRemote::new(), &InMemoryKeyValueStore::new());
        let ctx = TenantContext::member(UserId::new("p1"), TenantId::new("A"), UserType::Porteiro);
        let err = registry
            .set_feature(&ctx, Profile::Morador, FeatureKey::new("marketplace"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CondorError::Permission(PermissionError::NotAdministrator { .. })));
    }

    #[tokio::test]
    async fn test_administrator_of_other_tenant_is_refused() {
        let registry = registry(&MockRemote::new(), &InMemoryKeyValueStore::new());
        let err = registry
            .set_feature(&sindico("B"), Profile::Morador, FeatureKey::new("marketplace"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CondorError::Tenant(TenantError::AccessDenied { .. })));
    }

    #[tokio::test]
    async fn test_local_copy_seeds_new_registry() {
        let remote = MockRemote::new();
        let local = InMemoryKeyValueStore::new();
        registry(&remote, &local)
            .set_feature(&sindico("A"), Profile::Zelador, FeatureKey::new("agenda"), false)
            .await
            .unwrap();

        let restarted = registry(&MockRemote::new(), &local);
        assert_eq!(restarted.version(), 1);
        assert!(!restarted.is_feature_enabled(Profile::Zelador, &FeatureKey::new("agenda")));
    }

    #[tokio::test]
    async fn test_refresh_ignores_other_tenants() {
        let remote = MockRemote::new();
        remote.insert(
            "TenantSettings",
            json!({"tenant_id": "A", "permissions": {"morador": {"marketplace": false}}, "permissions_version": 3}),
        );
        remote.insert(
            "TenantSettings",
            json!({"tenant_id": "B", "permissions": {"morador": {"marketplace": true}}, "permissions_version": 9}),
        );
        let registry = registry(&remote, &InMemoryKeyValueStore::new());
        assert_eq!(registry.refresh().await.unwrap(), 3);
        assert!(!registry.is_feature_enabled(Profile::Morador, &FeatureKey::new("marketplace")));
    }

    #[tokio::test]
    async fn test_unreadable_settings_row_is_skipped() {
        let remote = MockRemote::new();
        remote.insert(
            "TenantSettings",
            json!({"tenant_id": "A", "permissions": "garbage", "permissions_version": "x"}),
        );
        remote.insert(
            "TenantSettings",
            json!({"tenant_id": "A", "permissions": {"sindico": {"financeiro": false}}, "permissions_version": 2}),
        );
        let registry = registry(&remote, &InMemoryKeyValueStore::new());
        assert_eq!(registry.refresh().await.unwrap(), 2);
        assert!(!registry.is_feature_enabled(Profile::Sindico, &FeatureKey::new("financeiro")));

        registry
            .set_feature(&sindico("A"), Profile::Morador, FeatureKey::new("marketplace"), false)
            .await
            .unwrap();
        assert_eq!(registry.version(), 3);
    }

    #[test]
    fn test_admin_master_sees_every_feature() {
        let registry = registry(&MockRemote::new(), &InMemoryKeyValueStore::new());
        assert!(registry.is_enabled_for(UserType::AdminMaster, &FeatureKey::new("anything")));
    }
}
