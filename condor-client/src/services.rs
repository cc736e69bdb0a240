//! Wiring of the Condor services over a set of capabilities.
//!
//! [`Capabilities`] names the side-effecting collaborators (remote, stores,
//! clock, login hook). [`CoreServices`] builds the executor, cache, resolver,
//! tenant guard and permission registries on top of them.

use crate::api_client::RestClient;
use crate::config::ClientConfig;
use crate::executor::Executor;
use crate::identity::{IdentityResolver, ResolverDeps};
use crate::login::{LoginRedirect, TracingLoginRedirect};
use crate::permissions::{spawn_version_poller, PermissionRegistry, RegistryDeps, VersionBroadcast};
use crate::tenant::{TenantGuard, TenantScopedStore};
use condor_core::{
    CacheTtlConfig, Clock, CoalesceConfig, CondorResult, EntityNames, PermissionConfig,
    RetryConfig, SystemClock, TenantId,
};
use condor_storage::{
    EntityStore, FileKeyValueStore, IdentityService, InMemoryKeyValueStore, KeyValueStore,
    MockRemote, TieredCache,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Side-effecting collaborators the services run against.
#[derive(Clone)]
pub struct Capabilities {
    pub identity: Arc<dyn IdentityService>,
    pub entities: Arc<dyn EntityStore>,
    /// Per-session store backing the second cache tier.
    pub session: Arc<dyn KeyValueStore>,
    /// Store shared by every session; carries permission snapshots and versions.
    pub local: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub redirect: Arc<dyn LoginRedirect>,
}

impl Capabilities {
    /// REST remote plus file or in-memory stores, as configured.
    pub fn from_config(config: &ClientConfig) -> CondorResult<Self> {
        let rest = Arc::new(RestClient::new(&config.remote)?);
        Ok(Self {
            identity: rest.clone(),
            entities: rest,
            session: open_store(config.storage.session_path.as_deref())?,
            local: open_store(config.storage.local_path.as_deref())?,
            clock: Arc::new(SystemClock),
            redirect: Arc::new(TracingLoginRedirect::new(config.remote.login_url.clone())),
        })
    }

    /// Everything in memory, over a [`MockRemote`].
    pub fn in_memory(
        remote: MockRemote,
        clock: Arc<dyn Clock>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            identity: Arc::new(remote.clone()),
            entities: Arc::new(remote),
            session: Arc::new(InMemoryKeyValueStore::new()),
            local: Arc::new(InMemoryKeyValueStore::new()),
            clock,
            redirect,
        }
    }
}

fn open_store(path: Option<&Path>) -> CondorResult<Arc<dyn KeyValueStore>> {
    match path {
        Some(path) => Ok(Arc::new(FileKeyValueStore::open(path)?)),
        None => Ok(Arc::new(InMemoryKeyValueStore::new())),
    }
}

/// Policy sections the services are built from.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub retry: RetryConfig,
    pub cache: CacheTtlConfig,
    pub coalesce: CoalesceConfig,
    pub permissions: PermissionConfig,
    pub entities: EntityNames,
}

impl From<&ClientConfig> for Policy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            retry: config.retry.clone(),
            cache: config.cache.clone(),
            coalesce: config.coalesce.clone(),
            permissions: config.permissions.clone(),
            entities: config.entities.clone(),
        }
    }
}

/// The assembled services. Cheap to clone.
#[derive(Clone)]
pub struct CoreServices {
    capabilities: Capabilities,
    policy: Arc<Policy>,
    executor: Executor,
    cache: Arc<TieredCache>,
    resolver: IdentityResolver,
    guard: TenantGuard,
    broadcast: VersionBroadcast,
    registries: Arc<Mutex<HashMap<TenantId, PermissionRegistry>>>,
}

impl CoreServices {
    pub fn new(capabilities: Capabilities, policy: Policy) -> Self {
        let executor = Executor::new(policy.retry.clone());
        let cache = Arc::new(TieredCache::from_config(
            capabilities.session.clone(),
            capabilities.clock.clone(),
            &policy.cache,
        ));
        let resolver = IdentityResolver::new(
            ResolverDeps {
                identity: capabilities.identity.clone(),
                entities: capabilities.entities.clone(),
                executor: executor.clone(),
                cache: cache.clone(),
                redirect: capabilities.redirect.clone(),
            },
            policy.cache.clone(),
            &policy.coalesce,
            policy.entities.clone(),
        );
        let guard = TenantGuard::new(resolver.clone(), policy.cache.tenant_context_ttl());
        let broadcast = VersionBroadcast::new(
            capabilities.local.clone(),
            policy.permissions.broadcast_capacity,
        );
        Self {
            capabilities,
            policy: Arc::new(policy),
            executor,
            cache,
            resolver,
            guard,
            broadcast,
            registries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &ClientConfig) -> CondorResult<Self> {
        Ok(Self::new(Capabilities::from_config(config)?, Policy::from(config)))
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn guard(&self) -> &TenantGuard {
        &self.guard
    }

    pub fn broadcast(&self) -> &VersionBroadcast {
        &self.broadcast
    }

    /// Entity store scoped to the current caller's tenant.
    pub fn scoped_store(&self) -> TenantScopedStore {
        TenantScopedStore::new(
            self.capabilities.entities.clone(),
            self.executor.clone(),
            self.guard.clone(),
        )
    }

    /// The registry of `tenant_id`, created on first use. Every caller
    /// gets a handle on the same registry.
    pub fn registry_for(&self, tenant_id: &TenantId) -> PermissionRegistry {
        let mut registries = self.registries.lock().unwrap_or_else(|err| err.into_inner());
        registries
            .entry(tenant_id.clone())
            .or_insert_with(|| {
                PermissionRegistry::new(
                    tenant_id.clone(),
                    self.policy.entities.settings.clone(),
                    RegistryDeps {
                        store: self.capabilities.entities.clone(),
                        executor: self.executor.clone(),
                        local: self.capabilities.local.clone(),
                        clock: self.capabilities.clock.clone(),
                        broadcast: self.broadcast.clone(),
                    },
                )
            })
            .clone()
    }

    /// Registry of the caller's own tenant. `None` for an admin master,
    /// who belongs to no tenant.
    pub async fn current_registry(&self) -> CondorResult<Option<PermissionRegistry>> {
        let ctx = self.guard.context().await?;
        Ok(ctx.tenant_id().map(|tenant_id| self.registry_for(tenant_id)))
    }

    /// Keep `registry` in step with published versions until `cancel` fires.
    pub fn spawn_poller(
        &self,
        registry: PermissionRegistry,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        spawn_version_poller(registry, self.policy.permissions.poll_interval(), cancel)
    }

    /// Sign out remotely and drop every cached identity artefact.
    pub async fn sign_out(&self) -> CondorResult<()> {
        self.resolver.sign_out().await
    }
}
