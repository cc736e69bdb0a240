//! Configuration loading for Condor clients.
//!
//! `[remote]` is required. Every policy section falls back to its defaults
//! field by field.

use condor_core::{
    CacheTtlConfig, CoalesceConfig, ConfigError, EntityNames, PermissionConfig, RetryConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "CONDOR_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheTtlConfig,
    #[serde(default)]
    pub coalesce: CoalesceConfig,
    #[serde(default)]
    pub permissions: PermissionConfig,
    #[serde(default)]
    pub entities: EntityNames,
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("login_url", &self.login_url)
            .finish()
    }
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_login_url() -> String {
    "/login".to_string()
}

/// Where the session and local stores live. In-memory when unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub session_path: Option<PathBuf>,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Directive used when neither `CONDOR_LOG` nor `RUST_LOG` is set.
    #[serde(default)]
    pub filter: Option<String>,
}

impl ClientConfig {
    /// Load from `--config <path>` or `CONDOR_CONFIG`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Parse without validating.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|err| ConfigError::Parse {
            reason: err.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.remote.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::invalid("remote.base_url", "must not be empty"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "remote.base_url",
                "must start with http:// or https://",
            ));
        }
        if self.remote.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("remote.request_timeout_ms", "must be > 0"));
        }
        if self.remote.login_url.trim().is_empty() {
            return Err(ConfigError::invalid("remote.login_url", "must not be empty"));
        }
        if let Some(path) = &self.storage.session_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::invalid("storage.session_path", "must not be empty"));
            }
        }
        if let Some(path) = &self.storage.local_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::invalid("storage.local_path", "must not be empty"));
            }
        }
        self.retry.validate()?;
        self.cache.validate()?;
        self.permissions.validate()?;
        self.entities.validate()?;
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [remote]
        base_url = "https://condo.example.com"
    "#;

    #[test]
    fn test_minimal_config_uses_policy_defaults() {
        let config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.cache.identity_session_ttl_ms, 900_000);
        assert_eq!(config.coalesce.success_cooldown_ms, 3_000);
        assert_eq!(config.permissions.poll_interval_ms, 1_500);
        assert_eq!(config.entities.settings, "TenantSettings");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.remote.login_url, "/login");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = ClientConfig::from_toml(
            r#"
            [remote]
            base_url = "https://condo.example.com"
            colour = "blue"
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_partial_policy_section_overrides_one_field() {
        let config = ClientConfig::from_toml(
            r#"
            [remote]
            base_url = "http://localhost:8080"

            [retry]
            max_attempts = 3

            [logging]
            format = "json"
        "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 3_000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.remote.base_url = "condo.example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("remote.base_url"));
    }

    #[test]
    fn test_validate_checks_policy_sections() {
        let mut config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let mut config = ClientConfig::from_toml(MINIMAL).unwrap();
        config.remote.bearer_token = Some("secret-token".to_string());
        let rendered = format!("{:?}", config.remote);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("condor.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = ClientConfig::from_path(&path).unwrap();
        assert_eq!(config.remote.base_url, "https://condo.example.com");

        let missing = ClientConfig::from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
