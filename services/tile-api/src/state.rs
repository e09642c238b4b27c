//! Application state and shared resources.

use std::env;
use std::sync::Arc;

use bytes::Bytes;
use ingestion::Ingester;
use renderer::{Colormaps, GradientCache};
use storage::{DatasetRegistry, Extent, KeyValueStore, RedisKvStore};
use tiles_common::{TileCoord, TileResult};

use crate::caches::FlightCache;

/// Cache key for rendered tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    pub prefix: String,
    pub variable: String,
    pub coord: TileCoord,
    /// Colormap name, or empty for grayscale.
    pub colormap: String,
}

/// Cache key for tile metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    pub prefix: String,
    pub variable: String,
    pub coord: TileCoord,
}

/// Cache key for dataset-wide extents.
pub type ExtentKey = (String, String);

/// Shared application state.
pub struct AppState {
    pub registry: Arc<DatasetRegistry>,
    pub ingester: Ingester,
    pub colormaps: Colormaps,
    pub gradients: GradientCache,
    pub render_cache: FlightCache<RenderKey, Bytes>,
    pub metadata_cache: FlightCache<MetadataKey, serde_json::Value>,
    pub extent_cache: FlightCache<ExtentKey, Extent>,
}

impl AppState {
    /// Connect to the backing store configured in the environment.
    pub async fn new() -> TileResult<Self> {
        let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        let db = env::var("REDIS_DB").unwrap_or_else(|_| "0".to_string());
        let redis_url = format!("redis://{}:{}/{}", host, port, db);

        let store = Arc::new(RedisKvStore::connect(&redis_url).await?);
        Ok(Self::with_store(store))
    }

    /// Build state over an already-constructed store (used by tests and
    /// embedded runs).
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let registry = Arc::new(DatasetRegistry::new(store));
        let ingester = Ingester::new(Arc::clone(&registry));

        Self {
            registry,
            ingester,
            colormaps: Colormaps::builtin(),
            gradients: GradientCache::new(),
            render_cache: FlightCache::new(env_capacity("RENDER_CACHE_ENTRIES", 32)),
            metadata_cache: FlightCache::new(env_capacity("METADATA_CACHE_ENTRIES", 256)),
            extent_cache: FlightCache::new(env_capacity("EXTENT_CACHE_ENTRIES", 128)),
        }
    }
}

fn env_capacity(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryKvStore;

    #[test]
    fn test_env_capacity_default() {
        assert_eq!(env_capacity("NO_SUCH_CAPACITY_VAR", 17), 17);
    }

    #[tokio::test]
    async fn test_with_store_starts_empty() {
        let state = AppState::with_store(Arc::new(MemoryKvStore::new()));
        assert!(state.render_cache.is_empty().await);
        assert!(state.metadata_cache.is_empty().await);
        assert!(state.extent_cache.is_empty().await);
        assert!(state.registry.is_empty().await);
    }
}
