//! Cache Store Module
//!
//! Main cache engine combining keyed entries with TTL timers, background
//! refresh, conditional caching and round-robin eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheStats, Cached, Entry, EvictionRing, TimerHandle};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::strategy::{CacheStrategy, CacheWhenFn, FetchFn, PersistRequest};
use crate::tasks::{spawn_expiration, spawn_periodic_refresh, spawn_read_refresh};

// == Refresh Outcome ==
/// What a refresh attempt did to its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The entry was absent, expired, or removed while the refresh ran
    Missing,
    /// The entry was written less than the cooldown ago; nothing was fetched
    CoolingDown,
    /// Another refresh of the entry is still running; nothing was fetched
    InFlight,
    /// The new value was fetched but `cache_when` declined it
    Rejected,
    /// The new value was stored
    Updated,
}

/// Result of an expiration timer firing.
pub(crate) enum Expiry {
    Removed,
    /// Deadline was pushed back by a read; sleep until the new one
    Extended(Instant),
    /// Entry already gone or replaced
    Gone,
}

struct CacheState<V> {
    entries: HashMap<String, Entry<V>>,
    ring: Option<EvictionRing>,
    stats: CacheStats,
}

/// State shared between cache handles and their timer tasks.
pub(crate) struct Shared<V> {
    state: RwLock<CacheState<V>>,
    config: CacheConfig,
    cache_when: Option<CacheWhenFn<V>>,
    next_generation: AtomicU64,
}

/// What started a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// Periodic timer tick. Runs even while another refresh is in flight.
    Tick,
    /// Cache hit or explicit `refresh` call. At most one runs per entry.
    Demand,
}

/// Hands out the entry's fetch closure, or reports why the refresh is skipped.
/// Demand refreshes also mark the entry as refreshing.
fn begin_refresh<V>(
    entry: &mut Entry<V>,
    trigger: Trigger,
    cooldown: Duration,
    now: Instant,
) -> std::result::Result<FetchFn<V>, RefreshOutcome> {
    if entry.is_expired(now) {
        return Err(RefreshOutcome::Missing);
    }
    if trigger == Trigger::Demand && entry.refreshing {
        return Err(RefreshOutcome::InFlight);
    }
    if entry.in_cooldown(cooldown, now) {
        return Err(RefreshOutcome::CoolingDown);
    }
    if trigger == Trigger::Demand {
        entry.refreshing = true;
    }
    Ok(Arc::clone(&entry.fetch))
}

impl<V> Shared<V>
where
    V: Send + Sync + 'static,
{
    async fn accepts(&self, key: &str, value: &Arc<V>) -> Result<bool> {
        match &self.cache_when {
            None => Ok(true),
            Some(predicate) => {
                predicate(Arc::clone(value))
                    .await
                    .map_err(|source| CacheError::Predicate {
                        key: key.to_string(),
                        source,
                    })
            }
        }
    }

    // == Expire ==
    /// Called by the expiration timer of `key`'s `generation` incarnation.
    pub(crate) async fn expire(&self, key: &str, generation: u64) -> Expiry {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let CacheState { entries, stats, .. } = &mut *state;

        let deadline = match entries.get(key) {
            Some(entry) if entry.generation == generation => entry.expires_at,
            _ => return Expiry::Gone,
        };

        match deadline {
            None => Expiry::Gone,
            Some(deadline) if deadline > now => Expiry::Extended(deadline),
            Some(_) => {
                if let Some(mut entry) = entries.remove(key) {
                    // The caller is this timer; the rest are aborted on drop
                    if let Some(timer) = entry.expiration.take() {
                        timer.detach();
                    }
                }
                stats.record_expiration();
                stats.set_total_entries(entries.len());
                debug!("Entry expired: {}", key);
                Expiry::Removed
            }
        }
    }

    // == Periodic Refresh ==
    /// Runs one timer tick's refresh of one incarnation of `key`, with no cooldown.
    pub(crate) async fn periodic_refresh(&self, key: &str, generation: u64) -> Result<RefreshOutcome> {
        let fetch = {
            let mut state = self.state.write().await;
            let entry = match state.entries.get_mut(key) {
                Some(entry) if entry.generation == generation => entry,
                _ => return Ok(RefreshOutcome::Missing),
            };
            match begin_refresh(entry, Trigger::Tick, Duration::ZERO, Instant::now()) {
                Ok(fetch) => fetch,
                Err(outcome) => return Ok(outcome),
            }
        };
        self.finish_refresh(key, generation, Trigger::Tick, fetch).await
    }

    /// Second half of a refresh started by [`begin_refresh`]: fetch, judge, write.
    ///
    /// Writes only into the same incarnation that was marked, so a refresh that
    /// outlives its entry never brings the key back.
    pub(crate) async fn finish_refresh(
        &self,
        key: &str,
        generation: u64,
        trigger: Trigger,
        fetch: FetchFn<V>,
    ) -> Result<RefreshOutcome> {
        let value = match fetch().await {
            Ok(value) => Arc::new(value),
            Err(source) => {
                self.abandon_refresh(key, generation, trigger).await;
                return Err(CacheError::Fetch {
                    key: key.to_string(),
                    source,
                });
            }
        };

        let accepted = match self.accepts(key, &value).await {
            Ok(accepted) => accepted,
            Err(err) => {
                self.abandon_refresh(key, generation, trigger).await;
                return Err(err);
            }
        };

        let mut state = self.state.write().await;
        let CacheState { entries, stats, .. } = &mut *state;
        let entry = match entries.get_mut(key) {
            Some(entry) if entry.generation == generation => entry,
            _ => {
                debug!("Entry {} removed during refresh; dropping new value", key);
                return Ok(RefreshOutcome::Missing);
            }
        };

        if trigger == Trigger::Demand {
            entry.refreshing = false;
        }
        if !accepted {
            stats.record_rejection();
            return Ok(RefreshOutcome::Rejected);
        }

        entry.replace_value(value, Instant::now());
        stats.record_refresh();
        Ok(RefreshOutcome::Updated)
    }

    /// Records a failed refresh and clears its in-flight mark. The stored value stays.
    pub(crate) async fn abandon_refresh(&self, key: &str, generation: u64, trigger: Trigger) {
        let mut state = self.state.write().await;
        let CacheState { entries, stats, .. } = &mut *state;
        if let Some(entry) = entries.get_mut(key) {
            if trigger == Trigger::Demand && entry.generation == generation {
                entry.refreshing = false;
            }
        }
        stats.record_refresh_failure();
    }
}

// == Memory Cache ==
/// In-process cache engine.
///
/// Handles are cheap to clone and share one store. Timers are tokio tasks, so
/// the cache must be used from within a tokio runtime. Dropping the last handle
/// drops every entry and aborts every timer.
pub struct MemoryCache<V> {
    inner: Arc<Shared<V>>,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("config", &self.inner.config)
            .field("cache_when", &self.inner.cache_when.is_some())
            .finish_non_exhaustive()
    }
}

impl<V> MemoryCache<V>
where
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache that stores every computed value.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Creates an empty cache that stores only values `predicate` accepts.
    pub fn with_cache_when(config: CacheConfig, predicate: CacheWhenFn<V>) -> Result<Self> {
        Self::build(config, Some(predicate))
    }

    fn build(config: CacheConfig, cache_when: Option<CacheWhenFn<V>>) -> Result<Self> {
        config.validate()?;
        let state = CacheState {
            entries: HashMap::new(),
            ring: config.limit.map(EvictionRing::new),
            stats: CacheStats::new(),
        };
        Ok(Self {
            inner: Arc::new(Shared {
                state: RwLock::new(state),
                config,
                cache_when,
                next_generation: AtomicU64::new(1),
            }),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // == Refresh ==
    /// Recomputes `key` now, subject to the configured cooldown.
    ///
    /// Fetch and predicate failures are returned; the stored value is kept.
    /// The recompute runs in its own task, so dropping this future does not
    /// interrupt it.
    pub async fn refresh(&self, key: &str) -> Result<RefreshOutcome> {
        let (generation, fetch) = {
            let mut state = self.inner.state.write().await;
            let Some(entry) = state.entries.get_mut(key) else {
                return Ok(RefreshOutcome::Missing);
            };
            let cooldown = self.inner.config.cooldown;
            match begin_refresh(entry, Trigger::Demand, cooldown, Instant::now()) {
                Ok(fetch) => (entry.generation, fetch),
                Err(outcome) => return Ok(outcome),
            }
        };

        let shared = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let task = tokio::spawn(async move {
            shared
                .finish_refresh(&owned_key, generation, Trigger::Demand, fetch)
                .await
        });

        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                self.inner
                    .abandon_refresh(key, generation, Trigger::Demand)
                    .await;
                Err(CacheError::Fetch {
                    key: key.to_string(),
                    source: anyhow::anyhow!("refresh task failed: {join_err}"),
                })
            }
        }
    }

    // == Invalidate ==
    /// Removes an entry and cancels its timers. Returns true if it was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut state = self.inner.state.write().await;
        let removed = state.entries.remove(key).is_some();
        let count = state.entries.len();
        state.stats.set_total_entries(count);
        removed
    }

    // == Clear ==
    /// Removes every entry and cancels every timer.
    pub async fn clear(&self) {
        let mut state = self.inner.state.write().await;
        state.entries.clear();
        if let Some(ring) = state.ring.as_mut() {
            ring.clear();
        }
        state.stats.set_total_entries(0);
    }

    /// Returns true if `key` holds a live (unexpired) entry.
    pub async fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        let state = self.inner.state.read().await;
        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub async fn keys(&self) -> Vec<String> {
        let state = self.inner.state.read().await;
        state.entries.keys().cloned().collect()
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub async fn len(&self) -> usize {
        self.inner.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.state.read().await.entries.is_empty()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.read().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }
}

#[async_trait]
impl<V> CacheStrategy<V> for MemoryCache<V>
where
    V: Send + Sync + 'static,
{
    // == Retrieve ==
    async fn retrieve(&self, key: &str) -> Result<Option<Cached<V>>> {
        let now = Instant::now();
        let config = &self.inner.config;
        let mut state = self.inner.state.write().await;
        let CacheState { entries, stats, .. } = &mut *state;

        let Some(entry) = entries.get_mut(key) else {
            stats.record_miss();
            return Ok(None);
        };

        // Deadline passed but the timer has not run yet
        if entry.is_expired(now) {
            entries.remove(key);
            stats.record_expiration();
            stats.record_miss();
            stats.set_total_entries(entries.len());
            debug!("Entry expired on read: {}", key);
            return Ok(None);
        }

        let cached = entry.to_cached();

        if let (Some(ttl), true) = (config.expiration.ttl(), config.expiration.resets_on_read()) {
            entry.touch(ttl, now);
        }

        if config.refresh_after_read {
            if let Ok(fetch) = begin_refresh(entry, Trigger::Demand, config.cooldown, now) {
                let task = spawn_read_refresh(
                    Arc::downgrade(&self.inner),
                    key.to_string(),
                    entry.generation,
                    fetch,
                );
                entry.read_refresh = Some(TimerHandle::new(task));
            }
        }

        stats.record_hit();
        Ok(Some(cached))
    }

    // == Persist ==
    async fn persist(&self, request: PersistRequest<V>) -> Result<Arc<V>> {
        let PersistRequest { key, fetch } = request;
        let value = fetch().await.map_err(|source| CacheError::Fetch {
            key: key.clone(),
            source,
        })?;
        let value = Arc::new(value);

        if !self.inner.accepts(&key, &value).await? {
            self.inner.state.write().await.stats.record_rejection();
            debug!("Value for {} declined by cache_when", key);
            return Ok(value);
        }

        let config = &self.inner.config;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entry = Entry::new(
            Arc::clone(&value),
            fetch,
            generation,
            config.expiration.ttl(),
            Instant::now(),
        );

        let weak = Arc::downgrade(&self.inner);
        if let Some(deadline) = entry.expires_at {
            let task = spawn_expiration(weak.clone(), key.clone(), generation, deadline);
            entry.expiration = Some(TimerHandle::new(task));
        }
        if let Some(interval) = config.refresh_interval {
            let task = spawn_periodic_refresh(weak, key.clone(), generation, interval);
            entry.refresh = Some(TimerHandle::new(task));
        }

        let mut state = self.inner.state.write().await;
        let CacheState {
            entries,
            ring,
            stats,
        } = &mut *state;

        // A concurrent miss on the same key may have landed first
        if entries.insert(key.clone(), entry).is_some() {
            debug!("Replaced concurrently persisted entry: {}", key);
        }

        if let Some((victim, victim_generation)) =
            ring.as_mut().and_then(|ring| ring.push(&key, generation))
        {
            // A stale slot must not evict a newer incarnation of its key
            let live = entries
                .get(&victim)
                .is_some_and(|e| e.generation == victim_generation);
            if live {
                entries.remove(&victim);
                stats.record_eviction();
                debug!("Evicted {} to make room for {}", victim, key);
            }
        }

        stats.set_total_entries(entries.len());
        Ok(value)
    }
}
