//! Resolved identity states and the tenant context derived from them.
//!
//! [`IdentityRole`] is the outcome of one identity resolution cycle. Every
//! state a caller can be in is an explicit variant carrying only the fields
//! that state needs, so an incomplete membership can never be mistaken for
//! an authenticated one with missing fields.

use crate::{TenantError, TenantId, UserId, UserType};
use serde::{Deserialize, Serialize};

/// Stable state codes, shared with page-level consumers.
pub mod codes {
    pub const AUTHENTICATED: &str = "autenticado";
    pub const NEEDS_LOGIN: &str = "needs_login";
    pub const PENDING_APPROVAL: &str = "pendente_aprovacao";
    pub const INACTIVE: &str = "inativo";
    pub const NO_TENANT: &str = "sem_condominio";
    pub const NOT_REGISTERED: &str = "sem_cadastro";
    pub const ERROR: &str = "erro";
}

/// How an authenticated caller is bound to tenant data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Access {
    /// Global administrator, exempt from tenant scoping.
    AdminMaster,
    /// Member of exactly one tenant.
    Member {
        tenant_id: TenantId,
        user_type: UserType,
    },
}

/// A fully resolved caller with data access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub user_id: UserId,
    pub user_name: String,
    pub email: String,
    /// Membership record backing a `Member` access.
    #[serde(default)]
    pub membership_id: Option<String>,
    pub access: Access,
}

impl AuthenticatedIdentity {
    pub fn user_type(&self) -> UserType {
        match &self.access {
            Access::AdminMaster => UserType::AdminMaster,
            Access::Member { user_type, .. } => *user_type,
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        match &self.access {
            Access::AdminMaster => None,
            Access::Member { tenant_id, .. } => Some(tenant_id),
        }
    }

    pub fn is_admin_master(&self) -> bool {
        matches!(self.access, Access::AdminMaster)
    }
}

/// Outcome of resolving the current caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IdentityRole {
    Authenticated(AuthenticatedIdentity),
    /// The session is not authenticated; the caller must log in.
    NeedsLogin,
    /// Membership exists but awaits approval.
    PendingApproval {
        user_id: UserId,
        user_name: String,
        email: String,
        tenant_id: Option<TenantId>,
    },
    /// Membership was deactivated.
    Inactive {
        user_id: UserId,
        user_name: String,
        email: String,
        tenant_id: Option<TenantId>,
    },
    /// Membership exists but is not bound to any tenant.
    NoTenant {
        user_id: UserId,
        user_name: String,
        email: String,
    },
    /// No membership record matches the caller's contact key.
    NotRegistered { user_id: UserId, email: String },
    /// Resolution failed for a reason other than authentication.
    Error { message: String },
}

impl IdentityRole {
    /// Stable code for the state, e.g. `sem_condominio`.
    pub fn code(&self) -> &'static str {
        match self {
            IdentityRole::Authenticated(_) => codes::AUTHENTICATED,
            IdentityRole::NeedsLogin => codes::NEEDS_LOGIN,
            IdentityRole::PendingApproval { .. } => codes::PENDING_APPROVAL,
            IdentityRole::Inactive { .. } => codes::INACTIVE,
            IdentityRole::NoTenant { .. } => codes::NO_TENANT,
            IdentityRole::NotRegistered { .. } => codes::NOT_REGISTERED,
            IdentityRole::Error { .. } => codes::ERROR,
        }
    }

    /// True when the remote session is authenticated, regardless of whether
    /// the membership grants data access.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, IdentityRole::NeedsLogin | IdentityRole::Error { .. })
    }

    /// True only for a caller allowed to touch entity data.
    pub fn has_data_access(&self) -> bool {
        matches!(self, IdentityRole::Authenticated(_))
    }

    pub fn needs_login(&self) -> bool {
        matches!(self, IdentityRole::NeedsLogin)
    }

    pub fn as_authenticated(&self) -> Option<&AuthenticatedIdentity> {
        match self {
            IdentityRole::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn user_type(&self) -> Option<UserType> {
        self.as_authenticated().map(AuthenticatedIdentity::user_type)
    }

    /// Tenant of an authenticated caller. Informational states never expose
    /// a tenant here, so a pending membership cannot be used for data access.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.as_authenticated().and_then(|identity| identity.tenant_id())
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            IdentityRole::Authenticated(identity) => Some(&identity.user_id),
            IdentityRole::PendingApproval { user_id, .. }
            | IdentityRole::Inactive { user_id, .. }
            | IdentityRole::NoTenant { user_id, .. }
            | IdentityRole::NotRegistered { user_id, .. } => Some(user_id),
            IdentityRole::NeedsLogin | IdentityRole::Error { .. } => None,
        }
    }

    pub fn user_name(&self) -> Option<&str> {
        match self {
            IdentityRole::Authenticated(identity) => Some(&identity.user_name),
            IdentityRole::PendingApproval { user_name, .. }
            | IdentityRole::Inactive { user_name, .. }
            | IdentityRole::NoTenant { user_name, .. } => Some(user_name),
            IdentityRole::NotRegistered { .. }
            | IdentityRole::NeedsLogin
            | IdentityRole::Error { .. } => None,
        }
    }

    /// Human-readable reason for any state without data access.
    pub fn error(&self) -> Option<String> {
        match self {
            IdentityRole::Authenticated(_) => None,
            IdentityRole::NeedsLogin => Some("Login required".to_string()),
            IdentityRole::PendingApproval { .. } => {
                Some("Membership is awaiting approval".to_string())
            }
            IdentityRole::Inactive { .. } => Some("Membership is inactive".to_string()),
            IdentityRole::NoTenant { .. } => {
                Some("Membership is not bound to a condominium".to_string())
            }
            IdentityRole::NotRegistered { email, .. } => {
                Some(format!("No membership registered for {}", email))
            }
            IdentityRole::Error { message } => Some(message.clone()),
        }
    }
}

// ============================================================================
// TENANT CONTEXT
// ============================================================================

/// Per-request tenant scope derived from an authenticated identity.
///
/// Construction guarantees that a non-admin context always carries a tenant.
/// Deserialization goes through the same check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TenantContextRepr", into = "TenantContextRepr")]
pub struct TenantContext {
    user_id: UserId,
    tenant_id: Option<TenantId>,
    user_type: UserType,
}

impl TenantContext {
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            tenant_id: None,
            user_type: UserType::AdminMaster,
        }
    }

    pub fn member(user_id: UserId, tenant_id: TenantId, user_type: UserType) -> Self {
        Self {
            user_id,
            tenant_id: Some(tenant_id),
            user_type,
        }
    }

    /// Derive the context from a resolution outcome.
    pub fn from_identity(role: &IdentityRole) -> Result<Self, TenantError> {
        let identity = role
            .as_authenticated()
            .ok_or_else(|| TenantError::NoDataAccess {
                state: role.code().to_string(),
            })?;
        Ok(match &identity.access {
            Access::AdminMaster => Self::admin(identity.user_id.clone()),
            Access::Member {
                tenant_id,
                user_type,
            } => Self::member(identity.user_id.clone(), tenant_id.clone(), *user_type),
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// `None` only for an admin context.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    pub fn is_admin_master(&self) -> bool {
        self.user_type == UserType::AdminMaster
    }
}

#[derive(Serialize, Deserialize)]
struct TenantContextRepr {
    user_id: UserId,
    tenant_id: Option<TenantId>,
    user_type: UserType,
    is_admin_master: bool,
}

impl TryFrom<TenantContextRepr> for TenantContext {
    type Error = TenantError;

    fn try_from(repr: TenantContextRepr) -> Result<Self, Self::Error> {
        let is_admin = repr.user_type == UserType::AdminMaster;
        if is_admin != repr.is_admin_master {
            return Err(TenantError::InvalidContext {
                reason: "admin flag disagrees with user type".to_string(),
            });
        }
        match (is_admin, repr.tenant_id) {
            (true, _) => Ok(Self::admin(repr.user_id)),
            (false, Some(tenant_id)) => Ok(Self::member(repr.user_id, tenant_id, repr.user_type)),
            (false, None) => Err(TenantError::InvalidContext {
                reason: "non-admin context without tenant".to_string(),
            }),
        }
    }
}

impl From<TenantContext> for TenantContextRepr {
    fn from(ctx: TenantContext) -> Self {
        let is_admin_master = ctx.is_admin_master();
        Self {
            user_id: ctx.user_id,
            tenant_id: ctx.tenant_id,
            user_type: ctx.user_type,
            is_admin_master,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_identity() -> IdentityRole {
        IdentityRole::Authenticated(AuthenticatedIdentity {
            user_id: UserId::new("u1"),
            user_name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            membership_id: Some("m1".to_string()),
            access: Access::Member {
                tenant_id: TenantId::new("A"),
                user_type: UserType::Morador,
            },
        })
    }

    #[test]
    fn test_identity_role_serializes_with_state_tag() {
        let json = serde_json::to_value(member_identity()).unwrap();
        assert_eq!(json["state"], "authenticated");
        assert_eq!(json["access"]["kind"], "member");
        assert_eq!(json["access"]["tenant_id"], "A");

        let back: IdentityRole = serde_json::from_value(json).unwrap();
        assert_eq!(back, member_identity());
    }

    #[test]
    fn test_pending_approval_exposes_no_tenant() {
        let role = IdentityRole::PendingApproval {
            user_id: UserId::new("u1"),
            user_name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            tenant_id: Some(TenantId::new("A")),
        };
        assert_eq!(role.code(), codes::PENDING_APPROVAL);
        assert!(role.is_authenticated());
        assert!(!role.has_data_access());
        assert!(role.tenant_id().is_none());
        assert!(TenantContext::from_identity(&role).is_err());
    }

    #[test]
    fn test_context_from_member_identity() {
        let ctx = TenantContext::from_identity(&member_identity()).unwrap();
        assert_eq!(ctx.tenant_id(), Some(&TenantId::new("A")));
        assert_eq!(ctx.user_type(), UserType::Morador);
        assert!(!ctx.is_admin_master());
    }

    #[test]
    fn test_context_deserialization_rejects_tenantless_member() {
        let json = serde_json::json!({
            "user_id": "u1",
            "tenant_id": null,
            "user_type": "porteiro",
            "is_admin_master": false
        });
        assert!(serde_json::from_value::<TenantContext>(json).is_err());
    }

    #[test]
    fn test_admin_context_round_trip() {
        let ctx = TenantContext::admin(UserId::new("root"));
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["is_admin_master"], true);
        let back: TenantContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
