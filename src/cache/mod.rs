//! Cache Module
//!
//! Provides the in-memory cache engine with TTL expiration, background refresh,
//! conditional caching and round-robin eviction.

mod entry;
mod ring;
mod stats;
pub(crate) mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::Cached;
pub(crate) use entry::{Entry, TimerHandle};
pub use ring::EvictionRing;
pub use stats::CacheStats;
pub use store::{MemoryCache, RefreshOutcome};
