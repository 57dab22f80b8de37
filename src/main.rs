//! Memo Cache demo
//!
//! Memoizes a slow function with a cache configured from the environment and
//! reports timings and cache statistics.

use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{memoize, CacheConfig, MemoryCache};

/// Main entry point for the memo cache demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache configuration from environment variables
/// 3. Memoize a slow function over an in-memory cache
/// 4. Call it with repeated arguments and log how long each call took
/// 5. Log the final cache statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting memo cache demo");

    let config = CacheConfig::from_env().context("Failed to load cache configuration")?;
    info!("Configuration loaded: {:?}", config);

    let cache = MemoryCache::new(config)?;
    let slow_square = memoize(
        "slow_square",
        |n: u64| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(n * n)
        },
        cache.clone(),
    );

    for n in [3, 4, 3, 3, 4] {
        let started = Instant::now();
        let value = slow_square.call(n).await?;
        info!("slow_square({}) = {} in {:?}", n, value, started.elapsed());
    }

    let stats = cache.stats().await;
    info!("Cache stats: {}", serde_json::to_string(&stats)?);
    info!("Hit rate: {:.2}", stats.hit_rate());

    Ok(())
}
