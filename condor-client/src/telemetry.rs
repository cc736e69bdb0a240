//! Tracing subscriber initialisation.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "condor_client=info,info";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter {directive:?}: {reason}")]
    InvalidFilter { directive: String, reason: String },
    #[error("Tracing subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install the global subscriber. Call once at startup.
///
/// The filter comes from `CONDOR_LOG`, then `RUST_LOG`, then the config,
/// then the built-in default.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let directive = filter_directive(config);
    let filter = EnvFilter::try_new(&directive).map_err(|err| TelemetryError::InvalidFilter {
        directive: directive.clone(),
        reason: err.to_string(),
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|err| TelemetryError::AlreadyInitialized(err.to_string()))
}

fn filter_directive(config: &LoggingConfig) -> String {
    ["CONDOR_LOG", "RUST_LOG"]
        .into_iter()
        .find_map(|var| std::env::var(var).ok().filter(|value| !value.trim().is_empty()))
        .or_else(|| config.filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_reported() {
        let config = LoggingConfig {
            format: LogFormat::Pretty,
            filter: Some("condor_client=[".to_string()),
        };
        // Only meaningful when the environment does not override the filter.
        if std::env::var("CONDOR_LOG").is_err() && std::env::var("RUST_LOG").is_err() {
            assert!(matches!(
                init_tracing(&config),
                Err(TelemetryError::InvalidFilter { .. })
            ));
        }
    }
}
