//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the engine's invariants over generated operation
//! sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{EvictionRing, MemoryCache};
use crate::config::CacheConfig;
use crate::strategy::{cache_when, fetch_fn, CacheStrategy, FetchFn, PersistRequest};

// == Strategies ==
/// Generates keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Persist { key: String },
    Retrieve { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        key_strategy().prop_map(|key| CacheOp::Persist { key }),
        key_strategy().prop_map(|key| CacheOp::Retrieve { key }),
        key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

fn counting_fetch(calls: &Arc<AtomicUsize>) -> FetchFn<usize> {
    let calls = Arc::clone(calls);
    fetch_fn(move || {
        let calls = Arc::clone(&calls);
        async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, hits and misses match what the caller saw
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        tokio_test::block_on(async {
            let cache = MemoryCache::new(CacheConfig::default()).unwrap();
            let calls = Arc::new(AtomicUsize::new(0));
            let mut expected_hits: u64 = 0;
            let mut expected_misses: u64 = 0;

            for op in ops {
                match op {
                    CacheOp::Persist { key } => {
                        cache.persist(PersistRequest::new(key, counting_fetch(&calls))).await.unwrap();
                    }
                    CacheOp::Retrieve { key } => match cache.retrieve(&key).await.unwrap() {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    },
                    CacheOp::Invalidate { key } => {
                        cache.invalidate(&key).await;
                    }
                }
            }

            let stats = cache.stats().await;
            prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
            prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
            prop_assert_eq!(stats.total_entries, cache.len().await, "Total entries mismatch");
            Ok(())
        })?;
    }

    // Repeated hits share one value and never call the function again
    #[test]
    fn prop_idempotent_hit(key in key_strategy(), reads in 1usize..20) {
        tokio_test::block_on(async {
            let cache = MemoryCache::new(CacheConfig::default()).unwrap();
            let calls = Arc::new(AtomicUsize::new(0));
            let stored = cache
                .persist(PersistRequest::new(key.clone(), counting_fetch(&calls)))
                .await
                .unwrap();

            for _ in 0..reads {
                let cached = cache.retrieve(&key).await.unwrap().unwrap();
                prop_assert!(Arc::ptr_eq(&cached.value, &stored));
            }
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            Ok(())
        })?;
    }

    // The number of entries never exceeds the limit
    #[test]
    fn prop_capacity_enforcement(
        limit in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..100)
    ) {
        tokio_test::block_on(async {
            let cache = MemoryCache::new(CacheConfig::default().with_limit(limit)).unwrap();
            let calls = Arc::new(AtomicUsize::new(0));

            for op in ops {
                match op {
                    CacheOp::Persist { key } => {
                        cache.persist(PersistRequest::new(key, counting_fetch(&calls))).await.unwrap();
                    }
                    CacheOp::Retrieve { key } => {
                        cache.retrieve(&key).await.unwrap();
                    }
                    CacheOp::Invalidate { key } => {
                        cache.invalidate(&key).await;
                    }
                }
                let len = cache.len().await;
                prop_assert!(len <= limit, "Cache size {} exceeds limit {}", len, limit);
            }
            Ok(())
        })?;
    }

    // With distinct insertions, exactly the last `limit` keys survive
    #[test]
    fn prop_round_robin_keeps_latest_insertions(limit in 1usize..8, inserts in 1usize..40) {
        tokio_test::block_on(async {
            let cache = MemoryCache::new(CacheConfig::default().with_limit(limit)).unwrap();
            let calls = Arc::new(AtomicUsize::new(0));

            for i in 0..inserts {
                cache
                    .persist(PersistRequest::new(format!("k{i}"), counting_fetch(&calls)))
                    .await
                    .unwrap();
            }

            let live: HashSet<String> = cache.keys().await.into_iter().collect();
            let expected: HashSet<String> = (inserts.saturating_sub(limit)..inserts)
                .map(|i| format!("k{i}"))
                .collect();
            prop_assert_eq!(live, expected);
            Ok(())
        })?;
    }

    // The ring's Nth push displaces the (N - capacity)th
    #[test]
    fn prop_ring_victim_order(capacity in 1usize..10, pushes in 1usize..60) {
        let mut ring = EvictionRing::new(capacity);

        for i in 0..pushes {
            let victim = ring.push(&format!("k{i}"), i as u64);
            if i < capacity {
                prop_assert_eq!(victim, None);
            } else {
                let expected = i - capacity;
                prop_assert_eq!(victim, Some((format!("k{expected}"), expected as u64)));
            }
            prop_assert!(ring.len() <= capacity);
        }
    }

    // Values are cached from the first one the predicate accepts onward
    #[test]
    fn prop_cache_when_threshold(threshold in 0usize..6, calls_made in 1usize..12) {
        tokio_test::block_on(async {
            let predicate = cache_when(move |value: Arc<usize>| async move { Ok(*value >= threshold) });
            let cache = MemoryCache::with_cache_when(CacheConfig::default(), predicate).unwrap();
            let calls = Arc::new(AtomicUsize::new(0));

            for _ in 0..calls_made {
                if cache.retrieve("k").await.unwrap().is_none() {
                    cache.persist(PersistRequest::new("k", counting_fetch(&calls))).await.unwrap();
                }
            }

            // Values 0..=threshold are computed until one passes
            let expected = calls_made.min(threshold + 1);
            prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
            Ok(())
        })?;
    }
}
