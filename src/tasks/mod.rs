//! Background Tasks Module
//!
//! Contains the per-entry background tasks spawned by the cache engine.
//!
//! # Tasks
//! - Expiration: removes an entry when its TTL runs out
//! - Periodic refresh: recomputes an entry on a fixed interval
//! - Read refresh: recomputes an entry once after a cache hit

mod timers;

pub(crate) use timers::{spawn_expiration, spawn_periodic_refresh, spawn_read_refresh};
