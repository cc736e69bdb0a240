//! Condor Storage - Remote Capabilities and Caching
//!
//! Traits for the remote entity and identity capabilities, synchronous
//! key-value stores, the two-tier cache, and an in-memory remote used by
//! tests and local runs.

pub mod cache;
mod filter;
mod kv;
mod mock;
mod remote;

pub use cache::{CacheEntry, CacheStats, MemoryCache, SessionCache, TieredCache, TieredStats, Tiers};
pub use filter::{Filter, FilterExpr, FilterOperator};
pub use kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use mock::{MockOp, MockRemote};
pub use remote::{record_id, EntityStore, IdentityService};
