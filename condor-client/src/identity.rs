//! Identity resolution: who the caller is, which tenant they belong to, and
//! in which role.
//!
//! Resolution checks the memory tier, then the session tier, then the remote.
//! Concurrent resolutions share one remote fetch, and only a fully
//! authenticated result is cached. Any other fetched state evicts the
//! cached identity and tenant context.

use crate::executor::Executor;
use crate::login::LoginRedirect;
use crate::single_flight::SingleFlight;
use condor_core::{
    Access, AuthenticatedIdentity, CacheTtlConfig, CoalesceConfig, CondorError, CondorResult,
    EntityNames, IdentityRole, MembershipRecord, MembershipStatus, Principal, UserType,
};
use condor_storage::{EntityStore, IdentityService, TieredCache, Tiers};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cache key of the resolved identity.
pub const IDENTITY_CACHE_KEY: &str = "identity_role";
/// Cache key of the derived tenant context.
pub const TENANT_CONTEXT_CACHE_KEY: &str = "tenant_context";

const WHO_AM_I: &str = "auth.me";
const RESOLVE: &str = "identity.resolve";

/// Observable progress of the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverPhase {
    Idle,
    CheckingMemoryCache,
    CheckingSessionCache,
    FetchingRemote,
    Resolved,
    Errored,
}

struct ResolverInner {
    identity: Arc<dyn IdentityService>,
    entities: Arc<dyn EntityStore>,
    executor: Executor,
    cache: Arc<TieredCache>,
    ttl: CacheTtlConfig,
    entity_names: EntityNames,
    redirect: Arc<dyn LoginRedirect>,
    who_am_i: SingleFlight<Principal>,
    resolution: SingleFlight<IdentityRole>,
    phase: Mutex<ResolverPhase>,
}

/// Resolves the current caller into an [`IdentityRole`]. Clones share state.
#[derive(Clone)]
pub struct IdentityResolver {
    inner: Arc<ResolverInner>,
}

/// Collaborators of an [`IdentityResolver`].
pub struct ResolverDeps {
    pub identity: Arc<dyn IdentityService>,
    pub entities: Arc<dyn EntityStore>,
    pub executor: Executor,
    pub cache: Arc<TieredCache>,
    pub redirect: Arc<dyn LoginRedirect>,
}

impl IdentityResolver {
    pub fn new(
        deps: ResolverDeps,
        ttl: CacheTtlConfig,
        coalesce: &CoalesceConfig,
        entity_names: EntityNames,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                identity: deps.identity,
                entities: deps.entities,
                executor: deps.executor,
                cache: deps.cache,
                ttl,
                entity_names,
                redirect: deps.redirect,
                who_am_i: SingleFlight::new(coalesce.success_cooldown()),
                resolution: SingleFlight::new(Duration::ZERO),
                phase: Mutex::new(ResolverPhase::Idle),
            }),
        }
    }

    pub fn phase(&self) -> ResolverPhase {
        *self.inner.phase.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.inner.cache
    }

    /// Resolve the caller. `force_refresh` skips both cache tiers but still
    /// joins a resolution that is already in flight.
    pub async fn resolve(&self, force_refresh: bool) -> IdentityRole {
        if !force_refresh {
            self.set_phase(ResolverPhase::CheckingMemoryCache);
            if let Some(role) = self.inner.cache.get::<IdentityRole>(IDENTITY_CACHE_KEY, Tiers::Memory) {
                self.set_phase(ResolverPhase::Resolved);
                return role;
            }
            self.set_phase(ResolverPhase::CheckingSessionCache);
            if let Some(role) = self.inner.cache.get::<IdentityRole>(IDENTITY_CACHE_KEY, Tiers::Both) {
                self.set_phase(ResolverPhase::Resolved);
                return role;
            }
        }

        self.set_phase(ResolverPhase::FetchingRemote);
        let resolver = self.clone();
        let shared = self
            .inner
            .resolution
            .run(RESOLVE, move || async move { Ok(resolver.fetch_remote().await) })
            .await;

        let role = shared.unwrap_or_else(|err| IdentityRole::Error {
            message: err.to_string(),
        });
        self.set_phase(match role {
            IdentityRole::Error { .. } => ResolverPhase::Errored,
            _ => ResolverPhase::Resolved,
        });
        role
    }

    /// Cached identity without any I/O: memory first, then session.
    pub fn cached(&self) -> Option<IdentityRole> {
        self.inner.cache.get(IDENTITY_CACHE_KEY, Tiers::Both)
    }

    /// Drop the cached identity and tenant context from both tiers.
    pub fn invalidate(&self) {
        self.drop_cached();
        self.inner.who_am_i.forget(WHO_AM_I);
        self.set_phase(ResolverPhase::Idle);
        tracing::debug!("Identity cache invalidated");
    }

    /// End the remote session, drop local identity state and send the caller
    /// to login. Local state is cleared even when the remote call fails.
    pub async fn sign_out(&self) -> CondorResult<()> {
        let identity = Arc::clone(&self.inner.identity);
        let result = self
            .inner
            .executor
            .execute("auth.logout", || identity.sign_out())
            .await;
        self.invalidate();
        self.inner.redirect.redirect_to_login("signed out");
        if let Err(err) = &result {
            tracing::warn!(error = %err, "Remote sign-out failed; local session cleared");
        }
        result
    }

    async fn fetch_remote(&self) -> IdentityRole {
        let identity = Arc::clone(&self.inner.identity);
        let principal = self
            .inner
            .executor
            .execute_coalesced(&self.inner.who_am_i, WHO_AM_I, move || {
                let identity = Arc::clone(&identity);
                async move { identity.who_am_i().await }
            })
            .await;

        let principal = match principal {
            Ok(principal) => principal,
            Err(err) => return self.remote_failure(err),
        };

        if principal.role.is_admin() {
            tracing::info!(user_id = %principal.id, "Resolved global administrator");
            let role = IdentityRole::Authenticated(AuthenticatedIdentity {
                user_id: principal.id.clone(),
                user_name: principal.display_name(),
                email: principal.email.clone(),
                membership_id: None,
                access: Access::AdminMaster,
            });
            self.store(&role);
            return role;
        }

        let entity = self.inner.entity_names.membership.clone();
        let entities = Arc::clone(&self.inner.entities);
        let records = self
            .inner
            .executor
            .execute("membership.list", || entities.list(&entity))
            .await;
        let records = match records {
            Ok(records) => records,
            Err(err) => return self.remote_failure(err),
        };

        let membership = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<MembershipRecord>(record) {
                Ok(membership) => Some(membership),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping unreadable membership record");
                    None
                }
            })
            .find(|membership| membership.matches_email(&principal.email));

        let role = classify_membership(&principal, membership);
        tracing::info!(
            user_id = %principal.id,
            state = role.code(),
            tenant_id = ?role.tenant_id(),
            "Resolved identity"
        );
        if role.has_data_access() {
            self.store(&role);
        } else {
            // A role without data access must not leave an earlier grant behind.
            self.drop_cached();
        }
        role
    }

    fn remote_failure(&self, err: CondorError) -> IdentityRole {
        if err.is_authentication() {
            tracing::info!(error = %err, "Caller is not logged in");
            self.invalidate();
            self.inner.redirect.redirect_to_login(&err.to_string());
            return IdentityRole::NeedsLogin;
        }
        tracing::error!(error = %err, "Identity resolution failed");
        IdentityRole::Error {
            message: err.to_string(),
        }
    }

    fn drop_cached(&self) {
        for key in [IDENTITY_CACHE_KEY, TENANT_CONTEXT_CACHE_KEY] {
            if let Err(err) = self.inner.cache.remove(key, Tiers::Both) {
                tracing::warn!(key = %key, error = %err, "Failed to invalidate cached identity");
            }
        }
    }

    fn store(&self, role: &IdentityRole) {
        let cache = &self.inner.cache;
        let written = cache
            .set(IDENTITY_CACHE_KEY, role, self.inner.ttl.memory_ttl(), Tiers::Memory)
            .and_then(|()| {
                cache.set(
                    IDENTITY_CACHE_KEY,
                    role,
                    self.inner.ttl.identity_session_ttl(),
                    Tiers::Session,
                )
            });
        if let Err(err) = written {
            tracing::warn!(error = %err, "Failed to cache resolved identity");
        }
    }

    fn set_phase(&self, phase: ResolverPhase) {
        let mut current = self.inner.phase.lock().unwrap_or_else(|err| err.into_inner());
        if *current != phase {
            tracing::debug!(from = ?*current, to = ?phase, "Resolver phase");
            *current = phase;
        }
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("phase", &self.phase())
            .finish()
    }
}

/// Map a principal and its matching membership (if any) to a role.
fn classify_membership(principal: &Principal, membership: Option<MembershipRecord>) -> IdentityRole {
    let Some(membership) = membership else {
        return IdentityRole::NotRegistered {
            user_id: principal.id.clone(),
            email: principal.email.clone(),
        };
    };

    let user_name = membership
        .full_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| principal.display_name());

    let Some(tenant_id) = membership.tenant_binding().cloned() else {
        return IdentityRole::NoTenant {
            user_id: principal.id.clone(),
            user_name,
            email: principal.email.clone(),
        };
    };

    match membership.status {
        MembershipStatus::Pendente => IdentityRole::PendingApproval {
            user_id: principal.id.clone(),
            user_name,
            email: principal.email.clone(),
            tenant_id: Some(tenant_id),
        },
        MembershipStatus::Inativo => IdentityRole::Inactive {
            user_id: principal.id.clone(),
            user_name,
            email: principal.email.clone(),
            tenant_id: Some(tenant_id),
        },
        MembershipStatus::Aprovado => {
            let user_type = match membership.user_type {
                Some(UserType::AdminMaster) => {
                    tracing::warn!(
                        user_id = %principal.id,
                        membership_id = %membership.id,
                        "Membership claims admin_master without a global admin principal; treating as administrador"
                    );
                    UserType::Administrador
                }
                Some(user_type) => user_type,
                None => UserType::Morador,
            };
            IdentityRole::Authenticated(AuthenticatedIdentity {
                user_id: principal.id.clone(),
                user_name,
                email: principal.email.clone(),
                membership_id: Some(membership.id),
                access: Access::Member {
                    tenant_id,
                    user_type,
                },
            })
        }
    }
}
