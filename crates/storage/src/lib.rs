//! Storage abstractions for the grid-tiles services.
//!
//! Provides the gateway to the backing chunked-array store:
//! - A key-value transport trait with Redis and in-memory implementations
//! - Dataset handles with bbox-windowed chunk reads and extent reduction
//! - A prefix-keyed registry of process-lifetime dataset handles

pub mod dataset;
pub mod kv;
pub mod registry;

pub use dataset::{ArrayGrid, ArrayMeta, Dataset, Extent, Slice, DEFAULT_CHUNK_SIZE};
pub use kv::{KeyValueStore, MemoryKvStore, RedisKvStore};
pub use registry::DatasetRegistry;
