//! Tunable policy sections.
//!
//! Every section deserializes with defaults for missing fields, so a config
//! file only needs to name the values it overrides. Durations are plain
//! milliseconds to keep TOML readable.

use crate::{ConfigError, DurationMs};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// RETRY
// ============================================================================

/// Retry, backoff and timeout policy of the resilient call executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Jitter window before the first attempt.
    pub initial_delay_min_ms: DurationMs,
    pub initial_delay_max_ms: DurationMs,
    /// Attempt `n >= 1` waits `base_delay_ms * 2^(n-1)`.
    pub base_delay_ms: DurationMs,
    /// Extra delay after a network-classified failure.
    pub network_penalty_min_ms: DurationMs,
    pub network_penalty_max_ms: DurationMs,
    pub attempt_timeout_ms: DurationMs,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_min_ms: 300,
            initial_delay_max_ms: 800,
            base_delay_ms: 3_000,
            network_penalty_min_ms: 3_000,
            network_penalty_max_ms: 4_000,
            attempt_timeout_ms: 60_000,
        }
    }
}

impl RetryConfig {
    /// Backoff before `attempt` (zero-based). Attempt 0 uses the jitter window
    /// instead and returns zero here.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Configuration without any waiting, for tests that do not exercise timing.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_min_ms: 0,
            initial_delay_max_ms: 0,
            base_delay_ms: 0,
            network_penalty_min_ms: 0,
            network_penalty_max_ms: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.initial_delay_min_ms > self.initial_delay_max_ms {
            return Err(ConfigError::invalid(
                "retry.initial_delay_min_ms",
                "must not exceed initial_delay_max_ms",
            ));
        }
        if self.network_penalty_min_ms > self.network_penalty_max_ms {
            return Err(ConfigError::invalid(
                "retry.network_penalty_min_ms",
                "must not exceed network_penalty_max_ms",
            ));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "retry.attempt_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Lifetimes of cached identity and reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheTtlConfig {
    /// Default memory-tier lifetime.
    pub memory_ttl_ms: DurationMs,
    pub identity_session_ttl_ms: DurationMs,
    pub tenant_context_ttl_ms: DurationMs,
    /// Prefix of every session-tier key.
    pub session_prefix: String,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            memory_ttl_ms: 10 * 60 * 1_000,
            identity_session_ttl_ms: 15 * 60 * 1_000,
            tenant_context_ttl_ms: 10 * 60 * 1_000,
            session_prefix: "condor_cache:".to_string(),
        }
    }
}

impl CacheTtlConfig {
    pub fn memory_ttl(&self) -> Duration {
        Duration::from_millis(self.memory_ttl_ms)
    }

    pub fn identity_session_ttl(&self) -> Duration {
        Duration::from_millis(self.identity_session_ttl_ms)
    }

    pub fn tenant_context_ttl(&self) -> Duration {
        Duration::from_millis(self.tenant_context_ttl_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cache.memory_ttl_ms", self.memory_ttl_ms),
            ("cache.identity_session_ttl_ms", self.identity_session_ttl_ms),
            ("cache.tenant_context_ttl_ms", self.tenant_context_ttl_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if self.session_prefix.trim().is_empty() {
            return Err(ConfigError::invalid("cache.session_prefix", "must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// COALESCING
// ============================================================================

/// Identity call de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoalesceConfig {
    /// How long a successful result keeps serving new callers.
    pub success_cooldown_ms: DurationMs,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            success_cooldown_ms: 3_000,
        }
    }
}

impl CoalesceConfig {
    pub fn success_cooldown(&self) -> Duration {
        Duration::from_millis(self.success_cooldown_ms)
    }
}

// ============================================================================
// PERMISSIONS / ENTITIES
// ============================================================================

/// Permission registry refresh policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionConfig {
    pub poll_interval_ms: DurationMs,
    /// Capacity of the in-process update channel.
    pub broadcast_capacity: usize,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_500,
            broadcast_capacity: 64,
        }
    }
}

impl PermissionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "permissions.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::invalid(
                "permissions.broadcast_capacity",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Remote entity names the core reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityNames {
    pub membership: String,
    pub settings: String,
}

impl Default for EntityNames {
    fn default() -> Self {
        Self {
            membership: "Membership".to_string(),
            settings: "TenantSettings".to_string(),
        }
    }
}

impl EntityNames {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.membership.trim().is_empty() {
            return Err(ConfigError::invalid("entities.membership", "must not be empty"));
        }
        if self.settings.trim().is_empty() {
            return Err(ConfigError::invalid("entities.settings", "must not be empty"));
        }
        Ok(())
    }
}
