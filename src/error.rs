//! Error types for the memoization cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the memoization cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The memoized function failed while computing a value
    #[error("Fetch failed for key {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The `cache_when` predicate failed while judging a value
    #[error("Cache predicate failed for key {key}: {source}")]
    Predicate {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Arguments could not be turned into a cache key
    #[error("Key generation failed for {function_id}: {source}")]
    KeyGeneration {
        function_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Returns the cache key involved in the failure, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheError::Fetch { key, .. } | CacheError::Predicate { key, .. } => Some(key),
            CacheError::KeyGeneration { .. } | CacheError::InvalidConfig(_) => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the memoization cache.
pub type Result<T> = std::result::Result<T, CacheError>;
