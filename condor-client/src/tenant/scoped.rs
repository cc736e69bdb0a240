//! Records that carry a tenant binding.

use condor_core::{MembershipRecord, TenantId, TenantSettings};
use serde_json::Value;

/// Field holding the tenant id on JSON records.
pub const TENANT_FIELD: &str = "tenant_id";

/// Other names the remote has used for [`TENANT_FIELD`].
pub const LEGACY_TENANT_FIELDS: [&str; 2] = ["condominio_id", "tenantId"];

/// A record the tenant guard can read and stamp.
pub trait TenantScoped {
    /// Owning tenant; `None` when the record has no usable binding.
    fn tenant_id(&self) -> Option<TenantId>;

    fn set_tenant_id(&mut self, tenant_id: TenantId);

    /// Identifier used in security logs.
    fn record_id(&self) -> Option<String>;
}

impl TenantScoped for Value {
    /// Reads [`TENANT_FIELD`] and its legacy names. Fields that disagree
    /// leave the record unbound.
    fn tenant_id(&self) -> Option<TenantId> {
        let mut bound: Option<&str> = None;
        for field in std::iter::once(TENANT_FIELD).chain(LEGACY_TENANT_FIELDS) {
            let Some(raw) = self.get(field) else {
                continue;
            };
            let tenant = raw.as_str().filter(|tenant| !tenant.trim().is_empty())?;
            match bound {
                Some(existing) if existing != tenant => return None,
                _ => bound = Some(tenant),
            }
        }
        bound.map(TenantId::new)
    }

    /// Writes [`TENANT_FIELD`] and drops the legacy names. No-op on
    /// non-object values.
    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        if let Value::Object(map) = self {
            for field in LEGACY_TENANT_FIELDS {
                map.remove(field);
            }
            map.insert(TENANT_FIELD.to_string(), Value::String(tenant_id.into_inner()));
        }
    }

    fn record_id(&self) -> Option<String> {
        match self.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl TenantScoped for MembershipRecord {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_binding().cloned()
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }

    fn record_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

impl TenantScoped for TenantSettings {
    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id.clone())
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = tenant_id;
    }

    fn record_id(&self) -> Option<String> {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_tenant_binding() {
        let mut record = json!({"id": 1, "tenant_id": "B"});
        assert_eq!(TenantScoped::tenant_id(&record), Some(TenantId::new("B")));
        assert_eq!(record.record_id(), Some("1".to_string()));

        record.set_tenant_id(TenantId::new("A"));
        assert_eq!(record["tenant_id"], "A");
    }

    #[test]
    fn test_non_string_tenant_is_unbound() {
        assert_eq!(TenantScoped::tenant_id(&json!({"tenant_id": 7})), None);
        assert_eq!(TenantScoped::tenant_id(&json!({"tenant_id": ""})), None);
    }

    #[test]
    fn test_legacy_tenant_fields() {
        assert_eq!(
            TenantScoped::tenant_id(&json!({"condominio_id": "A"})),
            Some(TenantId::new("A"))
        );
        assert_eq!(
            TenantScoped::tenant_id(&json!({"tenantId": "A", "tenant_id": "A"})),
            Some(TenantId::new("A"))
        );
        assert_eq!(
            TenantScoped::tenant_id(&json!({"tenant_id": "A", "condominio_id": "B"})),
            None
        );
        assert_eq!(
            TenantScoped::tenant_id(&json!({"tenant_id": "A", "tenantId": ""})),
            None
        );

        let mut record = json!({"name": "x", "condominio_id": "B", "tenantId": "C"});
        record.set_tenant_id(TenantId::new("A"));
        assert_eq!(record, json!({"name": "x", "tenant_id": "A"}));
    }
}
