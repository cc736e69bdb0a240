//! Condor Test Utilities
//!
//! Shared test infrastructure for the Condor workspace:
//! - Fixtures for principals, membership records, roles and tenant contexts
//! - A scripted identity service for driving resolver edge cases
//! - Proptest generators for tenant-scoped data

pub use condor_storage::{InMemoryKeyValueStore, MockOp, MockRemote};

pub use condor_core::{
    Access, AuthenticatedIdentity, CondorError, CondorResult, FeatureKey, GlobalRole,
    IdentityRole, MembershipStatus, Principal, Profile, RemoteError, TenantContext, TenantId,
    UserId, UserType,
};

use async_trait::async_trait;
use condor_storage::IdentityService;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Entity name the fixtures store membership records under.
pub const MEMBERSHIP_ENTITY: &str = "Membership";

// ============================================================================
// FIXTURES
// ============================================================================

/// A regular principal whose id is derived from the e-mail.
pub fn principal(email: &str) -> Principal {
    Principal {
        id: UserId::new(format!("user-{}", email)),
        email: email.to_string(),
        full_name: Some(format!("Test {}", email)),
        role: GlobalRole::User,
    }
}

pub fn admin_principal() -> Principal {
    Principal {
        id: UserId::new("user-admin"),
        email: "admin@condor.test".to_string(),
        full_name: Some("Platform Admin".to_string()),
        role: GlobalRole::Admin,
    }
}

/// Membership record as the remote stores it, without an id.
pub fn membership(
    email: &str,
    tenant_id: &str,
    user_type: UserType,
    status: MembershipStatus,
) -> Value {
    json!({
        "email": email,
        "full_name": format!("Test {}", email),
        "tenant_id": tenant_id,
        "user_type": user_type,
        "status": status,
    })
}

/// A mock remote signed in as `email`, holding one membership for it.
pub fn remote_with_member(
    email: &str,
    tenant_id: &str,
    user_type: UserType,
    status: MembershipStatus,
) -> MockRemote {
    let remote = MockRemote::with_principal(principal(email));
    remote.insert(
        MEMBERSHIP_ENTITY,
        membership(email, tenant_id, user_type, status),
    );
    remote
}

pub fn approved_role(email: &str, tenant_id: &str, user_type: UserType) -> IdentityRole {
    let principal = principal(email);
    IdentityRole::Authenticated(AuthenticatedIdentity {
        user_name: principal.display_name(),
        user_id: principal.id,
        email: principal.email,
        membership_id: Some(format!("membership-{}", email)),
        access: Access::Member {
            tenant_id: TenantId::new(tenant_id),
            user_type,
        },
    })
}

pub fn admin_role() -> IdentityRole {
    let principal = admin_principal();
    IdentityRole::Authenticated(AuthenticatedIdentity {
        user_name: principal.display_name(),
        user_id: principal.id,
        email: principal.email,
        membership_id: None,
        access: Access::AdminMaster,
    })
}

pub fn pending_role(email: &str, tenant_id: &str) -> IdentityRole {
    let principal = principal(email);
    IdentityRole::PendingApproval {
        user_name: principal.display_name(),
        user_id: principal.id,
        email: principal.email,
        tenant_id: Some(TenantId::new(tenant_id)),
    }
}

pub fn member_context(tenant_id: &str, user_type: UserType) -> TenantContext {
    TenantContext::member(UserId::new("user-ctx"), TenantId::new(tenant_id), user_type)
}

pub fn admin_context() -> TenantContext {
    TenantContext::admin(UserId::new("user-admin"))
}

/// A tenant-scoped record with the given id.
pub fn tenant_record(id: &str, tenant_id: &str) -> Value {
    json!({ "id": id, "tenant_id": tenant_id, "title": format!("record {}", id) })
}

// ============================================================================
// SCRIPTED IDENTITY
// ============================================================================

/// Identity service replaying a fixed script of `who_am_i` outcomes.
///
/// Once the script runs out every call reports an unauthenticated caller.
#[derive(Debug, Default)]
pub struct ScriptedIdentityService {
    script: Mutex<VecDeque<CondorResult<Principal>>>,
    who_am_i_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl ScriptedIdentityService {
    pub fn new(script: impl IntoIterator<Item = CondorResult<Principal>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn push(&self, outcome: CondorResult<Principal>) {
        self.script
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push_back(outcome);
    }

    pub fn who_am_i_calls(&self) -> usize {
        self.who_am_i_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityService for ScriptedIdentityService {
    async fn who_am_i(&self) -> CondorResult<Principal> {
        self.who_am_i_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .pop_front();
        next.unwrap_or_else(|| {
            Err(RemoteError::Unauthenticated {
                reason: "script exhausted".to_string(),
            }
            .into())
        })
    }

    async fn sign_out(&self) -> CondorResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        "cond-[a-z0-9]{1,8}".prop_map(TenantId::new)
    }

    pub fn arb_feature_key() -> impl Strategy<Value = FeatureKey> {
        "[a-z]{3,10}(_[a-z]{2,6})?".prop_map(FeatureKey::new)
    }

    pub fn arb_profile() -> impl Strategy<Value = Profile> {
        prop::sample::select(Profile::ALL.to_vec())
    }

    /// Any user type except the global administrator.
    pub fn arb_member_user_type() -> impl Strategy<Value = UserType> {
        prop_oneof![
            Just(UserType::Administrador),
            Just(UserType::Sindico),
            Just(UserType::Porteiro),
            Just(UserType::Zelador),
            Just(UserType::Morador),
        ]
    }

    pub fn arb_member_context() -> impl Strategy<Value = TenantContext> {
        (arb_tenant_id(), arb_member_user_type()).prop_map(|(tenant_id, user_type)| {
            TenantContext::member(UserId::new("user-prop"), tenant_id, user_type)
        })
    }

    /// Records spread over a small pool of tenants, some without a tenant.
    pub fn arb_tenant_records(max: usize) -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(
            (
                "[a-z0-9]{6}",
                prop::option::weighted(0.9, prop::sample::select(vec!["cond-a", "cond-b", "cond-c"])),
            ),
            0..max,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(id, tenant)| match tenant {
                    Some(tenant) => tenant_record(&id, tenant),
                    None => json!({ "id": id, "title": "orphan" }),
                })
                .collect()
        })
    }
}
