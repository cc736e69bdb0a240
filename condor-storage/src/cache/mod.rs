//! Two-tier cache for identity and reference data.
//!
//! The memory tier is a process-lifetime map with a per-key TTL. The session
//! tier serializes the same entries into a [`KeyValueStore`](crate::KeyValueStore)
//! under a key prefix, so a restart backed by a durable store picks up where
//! the previous process left off.
//!
//! # Expiry
//!
//! Neither tier runs a sweeper. A read that finds an entry past its expiry
//! deletes it and reports a miss, so `get` never hands back an expired value.
//!
//! # Example
//!
//! ```ignore
//! cache.set("identity", &role, config.memory_ttl(), Tiers::Memory)?;
//! cache.set("identity", &role, config.identity_session_ttl(), Tiers::Session)?;
//!
//! // Memory first, then session (restoring memory on a hit).
//! let role: Option<IdentityRole> = cache.get("identity", Tiers::Both);
//! ```

pub mod entry;
pub mod memory;
pub mod session;
pub mod tiered;

pub use entry::{CacheEntry, CacheStats};
pub use memory::MemoryCache;
pub use session::SessionCache;
pub use tiered::{TieredCache, TieredStats, Tiers};
