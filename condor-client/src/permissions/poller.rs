//! Background refresh of a registry when its tenant's version moves.

use super::broadcast::PermissionsUpdated;
use super::registry::PermissionRegistry;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Refresh `registry` whenever a newer version is pushed on its broadcast
/// channel or observed in the shared local store. The store is polled every
/// `interval`. Stops when `cancel` fires.
///
/// The registry is first synced with the remote settings record right away,
/// and on every tick until one sync succeeds, so a client starting with an
/// empty local store still picks up the tenant's map.
pub fn spawn_version_poller(
    registry: PermissionRegistry,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut events = Some(registry.broadcast().subscribe());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(
            tenant_id = %registry.tenant_id(),
            interval_ms = interval.as_millis() as u64,
            "Permission version poller started"
        );

        let mut synced = tokio::select! {
            _ = cancel.cancelled() => return,
            synced = refresh(&registry, "startup") => synced,
        };
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !synced {
                        synced = refresh(&registry, "startup retry").await;
                        continue;
                    }
                    let observed = registry.broadcast().observed_version(registry.tenant_id());
                    if let Some(version) = observed {
                        if version > registry.version() {
                            refresh(&registry, "poll").await;
                        }
                    }
                }
                event = next_event(&mut events) => match event {
                    Ok(PermissionsUpdated { tenant_id, version }) => {
                        if &tenant_id == registry.tenant_id() && version > registry.version() {
                            refresh(&registry, "push").await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Permission events lagged, refreshing");
                        refresh(&registry, "lagged").await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Permission event channel closed, polling only");
                        events = None;
                    }
                },
            }
        }
        tracing::debug!(tenant_id = %registry.tenant_id(), "Permission version poller stopped");
    })
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<PermissionsUpdated>>,
) -> Result<PermissionsUpdated, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Returns whether the registry now reflects the remote record.
async fn refresh(registry: &PermissionRegistry, trigger: &str) -> bool {
    match registry.refresh().await {
        Ok(version) => {
            tracing::debug!(
                tenant_id = %registry.tenant_id(),
                version = version,
                trigger = %trigger,
                "Permissions reloaded"
            );
            true
        }
        Err(err) => {
            tracing::warn!(
                tenant_id = %registry.tenant_id(),
                trigger = %trigger,
                error = %err,
                "Permission refresh failed"
            );
            false
        }
    }
}
