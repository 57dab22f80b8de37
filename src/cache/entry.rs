//! Cache Entry Module
//!
//! Defines individual cache entries, their timer handles and the hit result.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::strategy::FetchFn;

// == Timer Handle ==
/// Owned handle to a background timer task. Dropping it aborts the task.
#[derive(Debug)]
pub struct TimerHandle(Option<JoinHandle<()>>);

impl TimerHandle {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self(Some(handle))
    }

    /// Releases the task without aborting it. Used by a timer that is removing
    /// its own entry.
    pub(crate) fn detach(mut self) {
        self.0.take();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

// == Cache Entry ==
/// A single cached key: value, recompute closure, timers and metadata.
pub struct Entry<V> {
    /// The stored value
    pub(crate) value: Arc<V>,
    /// Recomputes the value with the original arguments
    pub(crate) fetch: FetchFn<V>,
    /// One-shot expiration timer, present iff a TTL is configured
    pub(crate) expiration: Option<TimerHandle>,
    /// Repeating refresh timer, present iff periodic refresh is configured
    pub(crate) refresh: Option<TimerHandle>,
    /// Last read-triggered refresh task
    pub(crate) read_refresh: Option<TimerHandle>,
    /// Time of the last successful write
    pub(crate) modified: Instant,
    /// Expiration deadline, None = never expires
    pub(crate) expires_at: Option<Instant>,
    /// Identity of this incarnation of the key
    pub(crate) generation: u64,
    /// A read-triggered or explicit refresh of this entry is in flight
    pub(crate) refreshing: bool,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an entry written at `now`, without timers attached.
    pub(crate) fn new(
        value: Arc<V>,
        fetch: FetchFn<V>,
        generation: u64,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Self {
        Self {
            value,
            fetch,
            expiration: None,
            refresh: None,
            read_refresh: None,
            modified: now,
            expires_at: ttl.map(|ttl| now + ttl),
            generation,
            refreshing: false,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once `now` reaches its deadline, so a read exactly
    /// `ttl` after the last write already misses.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Returns true if the last write happened less than `cooldown` ago.
    pub fn in_cooldown(&self, cooldown: Duration, now: Instant) -> bool {
        self.modified + cooldown > now
    }

    /// Restarts the TTL countdown from `now`.
    pub(crate) fn touch(&mut self, ttl: Duration, now: Instant) {
        self.expires_at = Some(now + ttl);
    }

    /// Stores a refreshed value. The expiration deadline is left where it is.
    pub(crate) fn replace_value(&mut self, value: Arc<V>, now: Instant) {
        self.value = value;
        self.modified = now;
    }

    /// Snapshot of the value for a cache hit.
    pub(crate) fn to_cached(&self) -> Cached<V> {
        Cached {
            value: Arc::clone(&self.value),
            modified: self.modified,
        }
    }
}

impl<V> std::fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("modified", &self.modified)
            .field("expires_at", &self.expires_at)
            .field("generation", &self.generation)
            .field("refreshing", &self.refreshing)
            .field("has_expiration_timer", &self.expiration.is_some())
            .field("has_refresh_timer", &self.refresh.is_some())
            .finish_non_exhaustive()
    }
}

// == Cached ==
/// A cache hit. The value is shared with the cache, not copied.
#[derive(Debug)]
pub struct Cached<V> {
    pub value: Arc<V>,
    /// Time of the last successful write of this value
    pub modified: Instant,
}

impl<V> Cached<V> {
    pub fn into_value(self) -> Arc<V> {
        self.value
    }
}

impl<V> Clone for Cached<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            modified: self.modified,
        }
    }
}
