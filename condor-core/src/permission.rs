//! Per-tenant feature permissions and their audit trail.

use crate::{new_record_id, FeatureKey, Profile, TenantId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Most recent audit entries retained on a settings record.
pub const PERMISSION_HISTORY_LIMIT: usize = 100;

/// `profile -> feature -> enabled` for one tenant.
///
/// Absence of an explicit `false` means the feature is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<Profile, BTreeMap<FeatureKey, bool>>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, profile: Profile, feature: &FeatureKey) -> bool {
        self.0
            .get(&profile)
            .and_then(|features| features.get(feature))
            .copied()
            .unwrap_or(true)
    }

    /// Explicit value, `None` when the pair was never set.
    pub fn get(&self, profile: Profile, feature: &FeatureKey) -> Option<bool> {
        self.0.get(&profile)?.get(feature).copied()
    }

    pub fn set(&mut self, profile: Profile, feature: FeatureKey, enabled: bool) {
        self.0.entry(profile).or_default().insert(feature, enabled);
    }

    pub fn features(&self, profile: Profile) -> Option<&BTreeMap<FeatureKey, bool>> {
        self.0.get(&profile)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }
}

/// Direction of a permission toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Enabled,
    Disabled,
}

impl From<bool> for AuditAction {
    fn from(enabled: bool) -> Self {
        if enabled {
            AuditAction::Enabled
        } else {
            AuditAction::Disabled
        }
    }
}

/// One recorded permission change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub actor: UserId,
    pub profile: Profile,
    pub feature: FeatureKey,
    pub action: AuditAction,
    pub at: Timestamp,
}

/// Tenant settings record holding the permission map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Remote record id; `None` until first persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "condominio_id")]
    pub tenant_id: TenantId,
    #[serde(default)]
    pub permissions: PermissionMap,
    #[serde(default)]
    pub permissions_version: u64,
    #[serde(default)]
    pub permission_history: Vec<AuditEntry>,
}

impl TenantSettings {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            id: None,
            tenant_id,
            permissions: PermissionMap::new(),
            permissions_version: 0,
            permission_history: Vec::new(),
        }
    }

    /// Merge one pair, record it, and bump the version.
    ///
    /// Every other pair of the map is left as read.
    pub fn apply_toggle(
        &mut self,
        actor: UserId,
        profile: Profile,
        feature: FeatureKey,
        enabled: bool,
        at: Timestamp,
    ) -> AuditEntry {
        self.permissions.set(profile, feature.clone(), enabled);
        let entry = AuditEntry {
            id: new_record_id(),
            actor,
            profile,
            feature,
            action: AuditAction::from(enabled),
            at,
        };
        self.permission_history.push(entry.clone());
        if self.permission_history.len() > PERMISSION_HISTORY_LIMIT {
            let excess = self.permission_history.len() - PERMISSION_HISTORY_LIMIT;
            self.permission_history.drain(..excess);
        }
        self.permissions_version += 1;
        entry
    }
}
