//! Single-flight LRU memoization for render, metadata and extent lookups.
//!
//! Each cache slot is either a finished value or a shared in-flight
//! computation. The first caller for a key installs a shared future and
//! drives it; every concurrent caller for the same key awaits that same
//! future, so one key never has more than one computation running. Only
//! successful results are memoized — a failed computation leaves the slot
//! empty and the next request retries the underlying work.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use lru::LruCache;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use tiles_common::{TileError, TileResult};

type SharedComputation<V> = Shared<BoxFuture<'static, TileResult<V>>>;

enum Slot<V> {
    Ready(V),
    /// Generation tag plus the shared in-flight computation. The tag lets
    /// the installer recognise its own entry during post-completion
    /// bookkeeping even if the key was evicted and re-installed meanwhile.
    Pending(u64, SharedComputation<V>),
}

/// Counters for one cache, lock-free for the stats endpoint.
#[derive(Default)]
pub struct FlightCacheStats {
    /// Requests served from a finished slot.
    pub hits: AtomicU64,
    /// Requests that installed a new computation.
    pub misses: AtomicU64,
    /// Requests that joined another request's in-flight computation.
    pub coalesced: AtomicU64,
}

impl FlightCacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

/// Bounded single-flight memoization cache.
///
/// The internal lock is only ever held for slot bookkeeping; computations
/// run outside it, so requests for distinct keys proceed fully in
/// parallel.
pub struct FlightCache<K, V> {
    slots: Mutex<LruCache<K, Slot<V>>>,
    next_generation: AtomicU64,
    stats: FlightCacheStats,
}

impl<K, V> FlightCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `capacity` entries (LRU eviction).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            next_generation: AtomicU64::new(0),
            stats: FlightCacheStats::default(),
        }
    }

    pub fn stats(&self) -> &FlightCacheStats {
        &self.stats
    }

    /// Number of occupied slots (finished or in flight).
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get the value for `key`, computing it at most once across all
    /// concurrent callers.
    ///
    /// `compute` is only invoked on a miss; the future it returns runs
    /// outside the cache lock.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> TileResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TileResult<V>> + Send + 'static,
    {
        // Fast path: finished value or a computation to join.
        {
            let mut slots = self.slots.lock().await;
            match slots.get(&key) {
                Some(Slot::Ready(value)) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value.clone());
                }
                Some(Slot::Pending(_, shared)) => {
                    let shared = shared.clone();
                    drop(slots);
                    self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    return shared.await;
                }
                None => {}
            }
        }

        // Miss: build the shared computation, then re-check under the lock
        // in case another request installed one while we were unlocked.
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let shared: SharedComputation<V> = compute().boxed().shared();

        {
            let mut slots = self.slots.lock().await;
            match slots.get(&key) {
                Some(Slot::Ready(value)) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value.clone());
                }
                Some(Slot::Pending(_, existing)) => {
                    let existing = existing.clone();
                    drop(slots);
                    self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    return existing.await;
                }
                None => {
                    slots.put(key.clone(), Slot::Pending(generation, shared.clone()));
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let result = shared.await;

        // Finalize our own pending slot: memoize success, clear failure.
        {
            let mut slots = self.slots.lock().await;
            let ours = matches!(
                slots.peek(&key),
                Some(Slot::Pending(installed, _)) if *installed == generation
            );
            if ours {
                match &result {
                    Ok(value) => {
                        slots.put(key, Slot::Ready(value.clone()));
                    }
                    Err(_) => {
                        slots.pop(&key);
                    }
                }
            }
        }

        result
    }
}

/// Convenience used by callers that only have a cloneable error to share.
pub fn internal_error(context: &str, err: impl std::fmt::Display) -> TileError {
    TileError::InternalError(format!("{}: {}", context, err))
}
