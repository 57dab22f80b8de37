//! Memo Cache - An async function-memoization cache
//!
//! Wraps async functions so their results are cached by argument fingerprint,
//! with TTL expiration, background refresh, conditional caching and
//! size-bounded eviction.

pub mod cache;
pub mod config;
pub mod error;
pub mod memoize;
pub mod strategy;
mod tasks;

pub use cache::{CacheStats, Cached, MemoryCache, RefreshOutcome};
pub use config::{CacheConfig, CacheOptions};
pub use error::{CacheError, Result};
pub use memoize::{memoize, HashedKeys, KeyGenerator, Memoized};
pub use strategy::{cache_when, fetch_fn, CacheStrategy, PersistRequest};
