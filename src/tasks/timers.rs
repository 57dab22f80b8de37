//! Entry Timer Tasks
//!
//! Background tasks that expire and refresh individual cache entries.
//!
//! Every task holds only a weak reference to the cache, so a pending timer
//! never keeps a dropped cache alive. The returned `JoinHandle` is owned by the
//! entry, which aborts it when the entry leaves the cache.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::cache::store::{Expiry, RefreshOutcome, Shared, Trigger};
use crate::strategy::FetchFn;

/// Spawns the expiration timer for one incarnation of `key`.
///
/// Sleeps until `deadline`, then re-reads the entry's deadline: a read with
/// TTL reset may have moved it, in which case the timer sleeps again.
pub(crate) fn spawn_expiration<V>(
    cache: Weak<Shared<V>>,
    key: String,
    generation: u64,
    deadline: Instant,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut deadline = deadline;
        loop {
            sleep_until(deadline).await;

            let Some(cache) = cache.upgrade() else {
                return;
            };
            match cache.expire(&key, generation).await {
                Expiry::Extended(next) => deadline = next,
                Expiry::Removed | Expiry::Gone => return,
            }
        }
    })
}

/// Spawns the periodic refresh timer for one incarnation of `key`.
///
/// The first tick fires one `interval` after creation. Ticks use no cooldown
/// and do not wait for read-triggered refreshes.
pub(crate) fn spawn_periodic_refresh<V>(
    cache: Weak<Shared<V>>,
    key: String,
    generation: u64,
    interval: Duration,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(cache) = cache.upgrade() else {
                return;
            };
            match cache.periodic_refresh(&key, generation).await {
                Ok(RefreshOutcome::Missing) => {
                    debug!("Periodic refresh stopped, entry gone: {}", key);
                    return;
                }
                Ok(outcome) => debug!("Periodic refresh of {}: {:?}", key, outcome),
                Err(err) => warn!("Periodic refresh of {} failed: {}", key, err),
            }
        }
    })
}

/// Spawns a fire-and-forget refresh after a cache hit.
///
/// The entry was already marked as refreshing by the caller.
pub(crate) fn spawn_read_refresh<V>(
    cache: Weak<Shared<V>>,
    key: String,
    generation: u64,
    fetch: FetchFn<V>,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let Some(cache) = cache.upgrade() else {
            return;
        };
        match cache
            .finish_refresh(&key, generation, Trigger::Demand, fetch)
            .await {
            Ok(outcome) => debug!("Read refresh of {}: {:?}", key, outcome),
            Err(err) => warn!("Background refresh of {} failed: {}", key, err),
        }
    })
}
