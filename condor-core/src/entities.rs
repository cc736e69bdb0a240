//! Remote records consumed by the identity layer.

use crate::{GlobalRole, MembershipStatus, TenantId, UserId, UserType};
use serde::{Deserialize, Serialize};

/// Authenticated principal returned by the remote identity capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    /// E-mail-like contact key used to match membership records.
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: GlobalRole,
}

impl Principal {
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.email.clone())
    }
}

/// Per-tenant record binding a person to a tenant, a role, and a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, alias = "condominio_id")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, alias = "tipo_usuario")]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub status: MembershipStatus,
}

impl MembershipRecord {
    /// Case-insensitive contact key match, ignoring surrounding whitespace.
    pub fn matches_email(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Tenant binding, treating an empty string as absent.
    pub fn tenant_binding(&self) -> Option<&TenantId> {
        self.tenant_id
            .as_ref()
            .filter(|tenant| !tenant.as_str().trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_membership_deserializes_legacy_field_names() {
        let record: MembershipRecord = serde_json::from_value(json!({
            "id": "m1",
            "email": "Ana@Example.com",
            "condominio_id": "cond-1",
            "tipo_usuario": "porteiro",
            "status": "pendente"
        }))
        .unwrap();

        assert_eq!(record.tenant_id, Some(TenantId::new("cond-1")));
        assert_eq!(record.user_type, Some(UserType::Porteiro));
        assert_eq!(record.status, MembershipStatus::Pendente);
        assert!(record.matches_email(" ana@example.COM "));
    }

    #[test]
    fn test_empty_tenant_binding_is_absent() {
        let record = MembershipRecord {
            id: "m1".to_string(),
            email: "a@b.c".to_string(),
            full_name: None,
            tenant_id: Some(TenantId::new("  ")),
            user_type: Some(UserType::Morador),
            status: MembershipStatus::Aprovado,
        };
        assert!(record.tenant_binding().is_none());
    }

    #[test]
    fn test_principal_display_name_falls_back_to_email() {
        let principal = Principal {
            id: UserId::new("u1"),
            email: "ana@example.com".to_string(),
            full_name: Some(String::new()),
            role: GlobalRole::User,
        };
        assert_eq!(principal.display_name(), "ana@example.com");
    }
}
