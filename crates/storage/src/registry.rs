//! Prefix-keyed registry of dataset handles.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::dataset::Dataset;
use crate::kv::KeyValueStore;

/// Process-lifetime registry mapping dataset prefixes to shared handles.
///
/// Handles are created lazily on first reference and never evicted; the
/// registry is bounded by the number of distinct prefixes seen. A race on
/// first access may build a handle twice, but only one copy is ever
/// published.
pub struct DatasetRegistry {
    store: Arc<dyn KeyValueStore>,
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl DatasetRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            datasets: RwLock::new(HashMap::new()),
        }
    }

    /// Shared access to the underlying key-value store.
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /// Get the handle for `prefix`, creating it on first reference.
    ///
    /// Idempotent: repeated calls return the same handle.
    pub async fn get_or_open(&self, prefix: &str) -> Arc<Dataset> {
        {
            let datasets = self.datasets.read().await;
            if let Some(dataset) = datasets.get(prefix) {
                return Arc::clone(dataset);
            }
        }

        let mut datasets = self.datasets.write().await;
        // Double-check after acquiring the write lock.
        if let Some(dataset) = datasets.get(prefix) {
            return Arc::clone(dataset);
        }

        debug!(prefix, "opening dataset handle");
        let dataset = Arc::new(Dataset::new(prefix, Arc::clone(&self.store)));
        datasets.insert(prefix.to_string(), Arc::clone(&dataset));
        dataset
    }

    /// Number of handles currently open.
    pub async fn len(&self) -> usize {
        self.datasets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.datasets.read().await.is_empty()
    }
}
