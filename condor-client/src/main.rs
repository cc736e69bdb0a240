//! condor-probe: resolve the configured caller and print what they can see.

use color_eyre::eyre::{eyre, WrapErr};
use condor_client::config::ClientConfig;
use condor_client::load::LoadScope;
use condor_client::services::CoreServices;
use condor_client::telemetry::init_tracing;
use serde_json::json;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config = ClientConfig::load().wrap_err("loading condor configuration")?;
    init_tracing(&config.logging)?;
    let services = CoreServices::from_config(&config)?;
    let scope = LoadScope::new("probe");
    let _cancel = scope.cancel_on_drop();

    let force_refresh = std::env::args().any(|arg| arg == "--refresh");
    let role = scope
        .run("identity.resolve", async {
            Ok(services.resolver().resolve(force_refresh).await)
        })
        .await?;
    if let Some(error) = role.error() {
        return Err(eyre!("identity resolution failed: {}", error));
    }

    let context = match services.guard().context().await {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            tracing::info!(state = role.code(), error = %err, "Caller has no data access");
            None
        }
    };

    let mut permissions = None;
    if context.is_some() {
        if let Some(registry) = services.current_registry().await? {
            scope.run("permissions.refresh", registry.refresh()).await?;
            permissions = Some(json!({
                "version": registry.version(),
                "map": registry.snapshot(),
            }));
        }
    }

    let report = json!({
        "identity": role,
        "tenant_context": context,
        "permissions": permissions,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if std::env::args().any(|arg| arg == "--sign-out") {
        services.sign_out().await?;
    }
    Ok(())
}
