//! Memoization Module
//!
//! Wraps an async function so its results are cached by argument fingerprint.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use xxhash_rust::xxh3::Xxh3;

use crate::error::{CacheError, Result};
use crate::strategy::{BoxFuture, CacheStrategy, FetchFn, PersistRequest};

// == Key Generator ==
/// Maps a function identity and its arguments to a cache key.
///
/// Implementations must be deterministic, and distinct argument lists should
/// map to distinct keys.
pub trait KeyGenerator<A>: Send + Sync {
    fn key(&self, function_id: &str, args: &A) -> Result<String>;
}

/// Default key generator: JSON-encodes the arguments and hashes them with
/// 128-bit xxh3, prefixed by the function id.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedKeys;

impl<A: Serialize> KeyGenerator<A> for HashedKeys {
    fn key(&self, function_id: &str, args: &A) -> Result<String> {
        let encoded = serde_json::to_vec(args).map_err(|source| CacheError::KeyGeneration {
            function_id: function_id.to_string(),
            source,
        })?;

        let mut hasher = Xxh3::new();
        hasher.update(function_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(&encoded);
        Ok(format!("{}:{:032x}", function_id, hasher.digest128()))
    }
}

type BoxedFn<A, V> = Arc<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

// == Memoized ==
/// A memoized async function.
pub struct Memoized<A, V> {
    function_id: String,
    func: BoxedFn<A, V>,
    strategy: Arc<dyn CacheStrategy<V>>,
    keys: Arc<dyn KeyGenerator<A>>,
}

impl<A, V> Clone for Memoized<A, V> {
    fn clone(&self) -> Self {
        Self {
            function_id: self.function_id.clone(),
            func: Arc::clone(&self.func),
            strategy: Arc::clone(&self.strategy),
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<A, V> std::fmt::Debug for Memoized<A, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("function_id", &self.function_id)
            .finish_non_exhaustive()
    }
}

impl<A, V> Memoized<A, V>
where
    A: Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Memoizes `func` under `function_id`, keyed by [`HashedKeys`].
    pub fn new<F, Fut, S>(function_id: impl Into<String>, func: F, strategy: S) -> Self
    where
        A: Serialize,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
        S: CacheStrategy<V> + 'static,
    {
        Self::with_key_generator(function_id, func, strategy, HashedKeys)
    }

    /// Memoizes `func` with a caller-supplied key generator.
    pub fn with_key_generator<F, Fut, S, K>(
        function_id: impl Into<String>,
        func: F,
        strategy: S,
        keys: K,
    ) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
        S: CacheStrategy<V> + 'static,
        K: KeyGenerator<A> + 'static,
    {
        Self {
            function_id: function_id.into(),
            func: Arc::new(move |args: A| {
                Box::pin(func(args)) as BoxFuture<'static, anyhow::Result<V>>
            }),
            strategy: Arc::new(strategy),
            keys: Arc::new(keys),
        }
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    // == Call ==
    /// Returns the cached result for `args`, computing and persisting it on a miss.
    ///
    /// Concurrent misses on the same arguments each call the function.
    pub async fn call(&self, args: A) -> Result<Arc<V>> {
        let key = self.keys.key(&self.function_id, &args)?;

        if let Some(cached) = self.strategy.retrieve(&key).await? {
            return Ok(cached.into_value());
        }

        let func = Arc::clone(&self.func);
        let fetch: FetchFn<V> = Arc::new(move || func(args.clone()));
        self.strategy.persist(PersistRequest::new(key, fetch)).await
    }
}

/// Shorthand for [`Memoized::new`].
pub fn memoize<A, V, F, Fut, S>(function_id: impl Into<String>, func: F, strategy: S) -> Memoized<A, V>
where
    A: Serialize + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    S: CacheStrategy<V> + 'static,
{
    Memoized::new(function_id, func, strategy)
}
