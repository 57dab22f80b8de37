//! Cache Strategy Module
//!
//! The two-operation contract between the memoizing wrapper and a cache backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::Cached;
use crate::error::Result;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Zero-argument closure that (re)computes a value by calling the memoized
/// function with its captured arguments.
pub type FetchFn<V> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

/// Async predicate deciding whether a computed value is stored.
pub type CacheWhenFn<V> =
    Arc<dyn Fn(Arc<V>) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

/// Wraps an async closure into a [`FetchFn`].
pub fn fetch_fn<V, F, Fut>(f: F) -> FetchFn<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as BoxFuture<'static, anyhow::Result<V>>)
}

/// Wraps an async predicate into a [`CacheWhenFn`].
pub fn cache_when<V, F, Fut>(f: F) -> CacheWhenFn<V>
where
    F: Fn(Arc<V>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(move |value| Box::pin(f(value)) as BoxFuture<'static, anyhow::Result<bool>>)
}

// == Persist Request ==
/// A confirmed miss handed to [`CacheStrategy::persist`].
pub struct PersistRequest<V> {
    pub key: String,
    pub fetch: FetchFn<V>,
}

impl<V> PersistRequest<V> {
    pub fn new(key: impl Into<String>, fetch: FetchFn<V>) -> Self {
        Self {
            key: key.into(),
            fetch,
        }
    }
}

impl<V> std::fmt::Debug for PersistRequest<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistRequest")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

// == Cache Strategy ==
/// Storage backend used by [`crate::memoize::Memoized`].
#[async_trait]
pub trait CacheStrategy<V>: Send + Sync {
    /// Looks up `key`. Never adds or removes keys on its own behalf, but a hit
    /// may trigger the entry's read-side behaviors (TTL reset, background refresh).
    async fn retrieve(&self, key: &str) -> Result<Option<Cached<V>>>;

    /// Computes the value for a missed key, stores it if accepted and returns it
    /// either way. Fetch failures propagate and leave the cache untouched.
    async fn persist(&self, request: PersistRequest<V>) -> Result<Arc<V>>;
}
