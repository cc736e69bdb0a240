//! Permission version announcements.
//!
//! Updates go out on two paths: a tokio broadcast channel for subscribers in
//! this process, and a version counter in the shared local store for anyone
//! else reading it (other processes or windows polling the same file).

use condor_core::TenantId;
use condor_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A tenant's permission map moved to `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsUpdated {
    pub tenant_id: TenantId,
    pub version: u64,
}

/// Publishes [`PermissionsUpdated`] events. Cheap to clone.
#[derive(Clone)]
pub struct VersionBroadcast {
    tx: broadcast::Sender<PermissionsUpdated>,
    local: Arc<dyn KeyValueStore>,
}

impl VersionBroadcast {
    pub fn new(local: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx, local }
    }

    /// Record the version in the shared store, then notify subscribers.
    pub fn publish(&self, event: PermissionsUpdated) {
        if let Err(err) = self
            .local
            .set(&version_key(&event.tenant_id), &event.version.to_string())
        {
            tracing::warn!(
                tenant_id = %event.tenant_id,
                error = %err,
                "Failed to record permissions version"
            );
        }
        let tenant_id = event.tenant_id.clone();
        let version = event.version;
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    version = version,
                    receivers = receivers,
                    "Broadcast permissions update"
                );
            }
            Err(_) => {
                tracing::debug!(tenant_id = %tenant_id, version = version, "No receivers for permissions update");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PermissionsUpdated> {
        self.tx.subscribe()
    }

    /// Latest version recorded in the shared store.
    pub fn observed_version(&self, tenant_id: &TenantId) -> Option<u64> {
        match self.local.get(&version_key(tenant_id)) {
            Ok(raw) => raw.and_then(|raw| raw.trim().parse().ok()),
            Err(err) => {
                tracing::warn!(tenant_id = %tenant_id, error = %err, "Failed to read permissions version");
                None
            }
        }
    }
}

impl std::fmt::Debug for VersionBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionBroadcast")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

fn version_key(tenant_id: &TenantId) -> String {
    format!("permissions_version:{}", tenant_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor_storage::InMemoryKeyValueStore;

    #[tokio::test]
    async fn test_publish_reaches_subscriber_and_store() {
        let store = InMemoryKeyValueStore::new();
        let broadcast = VersionBroadcast::new(Arc::new(store.clone()), 8);
        let mut rx = broadcast.subscribe();

        let event = PermissionsUpdated {
            tenant_id: TenantId::new("A"),
            version: 4,
        };
        broadcast.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
        assert_eq!(broadcast.observed_version(&TenantId::new("A")), Some(4));
        assert_eq!(broadcast.observed_version(&TenantId::new("B")), None);
    }

    #[test]
    fn test_publish_without_receivers_still_records_version() {
        let store = InMemoryKeyValueStore::new();
        let broadcast = VersionBroadcast::new(Arc::new(store.clone()), 8);
        broadcast.publish(PermissionsUpdated {
            tenant_id: TenantId::new("A"),
            version: 1,
        });
        assert_eq!(
            store.get("permissions_version:A").unwrap(),
            Some("1".to_string())
        );
    }
}
