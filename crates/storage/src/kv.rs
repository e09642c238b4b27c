//! Key-value transport for the chunked-array store.
//!
//! The chunk layout (see `dataset`) only needs get/put/scan primitives, so
//! the transport is a small object-safe trait. `RedisKvStore` is the
//! production implementation; `MemoryKvStore` backs tests and local runs
//! without a Redis instance.

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use tiles_common::{TileError, TileResult};

/// Async key-value primitives required by the dataset layer.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a single value.
    async fn get(&self, key: &str) -> TileResult<Option<Bytes>>;

    /// Fetch many values in one round trip, preserving key order.
    async fn get_many(&self, keys: &[String]) -> TileResult<Vec<Option<Bytes>>>;

    /// Store a value, replacing any previous one.
    async fn put(&self, key: &str, value: Bytes) -> TileResult<()>;

    /// Delete every key starting with `prefix`; returns the number deleted.
    async fn delete_prefix(&self, prefix: &str) -> TileResult<u64>;

    /// Liveness probe against the backing store.
    async fn ping(&self) -> TileResult<()>;
}

fn store_err(err: redis::RedisError) -> TileError {
    if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
        TileError::StoreUnavailable(err.to_string())
    } else {
        TileError::DataReadError(err.to_string())
    }
}

/// Redis-backed key-value store.
///
/// Uses a single multiplexed connection; clones of it share one TCP stream
/// and are safe to use from many tasks concurrently.
pub struct RedisKvStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisKvStore {
    /// Connect to Redis at the given URL (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(redis_url: &str) -> TileResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| TileError::StoreUnavailable(format!("redis client: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TileError::StoreUnavailable(format!("redis connect: {}", e)))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisKvStore {
    async fn get(&self, key: &str) -> TileResult<Option<Bytes>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(store_err)?;
        Ok(value.map(Bytes::from))
    }

    async fn get_many(&self, keys: &[String]) -> TileResult<Vec<Option<Bytes>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(values.into_iter().map(|v| v.map(Bytes::from)).collect())
    }

    async fn put(&self, key: &str, value: Bytes) -> TileResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(key, value.as_ref())
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> TileResult<u64> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len() as u64;
        let _: () = redis::cmd("DEL")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        Ok(count)
    }

    async fn ping(&self) -> TileResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

/// In-memory key-value store for tests and single-process runs.
///
/// Tracks read round trips so tests can assert that coalesced requests hit
/// the store exactly once.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Bytes>>,
    read_round_trips: AtomicU64,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of get/get_many round trips served so far.
    pub fn read_round_trips(&self) -> u64 {
        self.read_round_trips.load(Ordering::Relaxed)
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> TileResult<Option<Bytes>> {
        self.read_round_trips.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> TileResult<Vec<Option<Bytes>>> {
        self.read_round_trips.fetch_add(1, Ordering::Relaxed);
        let entries = self.entries.read().await;
        Ok(keys.iter().map(|k| entries.get(k).cloned()).collect())
    }

    async fn put(&self, key: &str, value: Bytes) -> TileResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> TileResult<u64> {
        let mut entries = self.entries.write().await;
        let doomed: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    async fn ping(&self) -> TileResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryKvStore::new();
        store.put("a/1", Bytes::from_static(b"one")).await.unwrap();
        store.put("a/2", Bytes::from_static(b"two")).await.unwrap();
        store.put("b/1", Bytes::from_static(b"three")).await.unwrap();

        assert_eq!(store.get("a/1").await.unwrap().unwrap().as_ref(), b"one");
        assert!(store.get("missing").await.unwrap().is_none());

        let many = store
            .get_many(&["a/2".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(many[0].as_ref().unwrap().as_ref(), b"two");
        assert!(many[1].is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete_prefix() {
        let store = MemoryKvStore::new();
        store.put("a/1", Bytes::from_static(b"x")).await.unwrap();
        store.put("a/2", Bytes::from_static(b"y")).await.unwrap();
        store.put("b/1", Bytes::from_static(b"z")).await.unwrap();

        let deleted = store.delete_prefix("a/").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.get("b/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_counts_round_trips() {
        let store = MemoryKvStore::new();
        store.put("k", Bytes::from_static(b"v")).await.unwrap();
        store.get("k").await.unwrap();
        store.get_many(&["k".to_string(), "k".to_string()]).await.unwrap();
        assert_eq!(store.read_round_trips(), 2);
    }
}
