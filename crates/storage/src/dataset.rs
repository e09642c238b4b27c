//! Dataset handles over the chunked-array layout.
//!
//! Each variable of a dataset is stored as a regular lat/lon grid split
//! into fixed-size chunks:
//!
//! - `{prefix}/.vars` — JSON array of variable names
//! - `{prefix}/{var}/.meta` — JSON [`ArrayMeta`] document
//! - `{prefix}/{var}/{cy}.{cx}` — one chunk, deflate-compressed
//!   little-endian `f32`, always `chunk_shape`-sized (edge chunks are
//!   padded with NaN)
//!
//! Latitude is stored descending (row 0 is the northmost row), so a
//! `[max_lat, min_lat]` window maps directly onto tile bounding boxes.

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

use tiles_common::{BoundingBox, TileError, TileResult};

use crate::kv::KeyValueStore;

/// Default chunk edge length used by the write path.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Metadata document describing one stored variable grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayMeta {
    /// Grid shape as [rows, cols] (latitude, longitude).
    pub shape: [usize; 2],
    /// Chunk shape as [rows, cols].
    pub chunk_shape: [usize; 2],
    /// Latitude of row 0 (the northmost row).
    pub lat_start: f64,
    /// Latitude step per row; negative (descending).
    pub lat_step: f64,
    /// Longitude of column 0.
    pub lon_start: f64,
    /// Longitude step per column; positive.
    pub lon_step: f64,
    /// Physical units of the samples.
    pub units: String,
    /// Human-readable description of the variable.
    pub description: String,
}

impl ArrayMeta {
    /// Geographic extent covered by the grid.
    pub fn coverage(&self) -> BoundingBox {
        let [rows, cols] = self.shape;
        let lat_end = self.lat_start + self.lat_step * rows as f64;
        let lon_end = self.lon_start + self.lon_step * cols as f64;
        BoundingBox::new(self.lon_start, lat_end, lon_end, self.lat_start)
    }

    /// Number of chunk rows/cols.
    pub fn chunk_grid(&self) -> (usize, usize) {
        (
            self.shape[0].div_ceil(self.chunk_shape[0]),
            self.shape[1].div_ceil(self.chunk_shape[1]),
        )
    }
}

/// A (min, max) pair of sample values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: f32,
    pub max: f32,
}

/// A 2-D window of samples cut from a stored variable grid.
///
/// Row-major, latitude descending; immutable once produced.
#[derive(Debug, Clone)]
pub struct Slice {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub units: String,
    pub description: String,
}

impl Slice {
    /// Min/max over the window, ignoring NaN samples.
    ///
    /// A window with no finite samples reduces to `(0, 0)`.
    pub fn extent(&self) -> Extent {
        reduce_extent_values(&self.data)
    }
}

/// A full grid plus metadata, as handed over by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct ArrayGrid {
    pub data: Vec<f32>,
    pub meta: ArrayMeta,
}

/// Half-open row/col index window into a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
}

/// Handle to one dataset prefix in the backing store.
///
/// Creation performs no I/O; handles are retained for the process lifetime
/// by [`crate::DatasetRegistry`].
pub struct Dataset {
    prefix: String,
    store: Arc<dyn KeyValueStore>,
}

impl Dataset {
    pub fn new(prefix: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            prefix: prefix.into(),
            store,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn vars_key(&self) -> String {
        format!("{}/.vars", self.prefix)
    }

    fn meta_key(&self, variable: &str) -> String {
        format!("{}/{}/.meta", self.prefix, variable)
    }

    fn chunk_key(&self, variable: &str, cy: usize, cx: usize) -> String {
        format!("{}/{}/{}.{}", self.prefix, variable, cy, cx)
    }

    /// List the variables stored under this prefix.
    pub async fn variables(&self) -> TileResult<Vec<String>> {
        match self.store.get(&self.vars_key()).await? {
            Some(raw) => serde_json::from_slice(&raw)
                .map_err(|e| TileError::DataReadError(format!("variable list: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    /// Fetch the metadata document for a variable.
    pub async fn meta(&self, variable: &str) -> TileResult<ArrayMeta> {
        let raw = self
            .store
            .get(&self.meta_key(variable))
            .await?
            .ok_or_else(|| {
                TileError::VariableNotFound(format!("{}/{}", self.prefix, variable))
            })?;

        serde_json::from_slice(&raw)
            .map_err(|e| TileError::DataReadError(format!("array metadata: {}", e)))
    }

    /// Read the window of `variable` that covers `bbox`.
    ///
    /// Index bounds use floor on the window start and ceil on the window
    /// end so adjacent tiles share their boundary samples. Only the chunks
    /// intersecting the window are fetched, in a single round trip.
    pub async fn read_slice(&self, variable: &str, bbox: &BoundingBox) -> TileResult<Slice> {
        let meta = self.meta(variable).await?;
        let window = window_for_bbox(&meta, bbox).ok_or_else(|| {
            TileError::TileOutOfCoverage(format!(
                "{}/{} has no samples in [{:.4},{:.4}]x[{:.4},{:.4}]",
                self.prefix, variable, bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat
            ))
        })?;

        let [chunk_rows, chunk_cols] = meta.chunk_shape;
        let cy0 = window.row0 / chunk_rows;
        let cy1 = (window.row1 - 1) / chunk_rows;
        let cx0 = window.col0 / chunk_cols;
        let cx1 = (window.col1 - 1) / chunk_cols;

        let mut keys = Vec::with_capacity((cy1 - cy0 + 1) * (cx1 - cx0 + 1));
        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                keys.push(self.chunk_key(variable, cy, cx));
            }
        }

        debug!(
            prefix = %self.prefix,
            variable,
            chunks = keys.len(),
            "reading slice window"
        );

        let raw_chunks = self.store.get_many(&keys).await?;
        let chunk_len = chunk_rows * chunk_cols;
        let mut chunks = Vec::with_capacity(raw_chunks.len());
        for raw in raw_chunks {
            chunks.push(match raw {
                Some(bytes) => Some(decode_chunk(&bytes, chunk_len)?),
                // Never written (all-fill chunk); reads back as NaN.
                None => None,
            });
        }

        let width = window.col1 - window.col0;
        let height = window.row1 - window.row0;
        let mut data = vec![f32::NAN; width * height];
        let chunks_per_row = cx1 - cx0 + 1;

        for r in window.row0..window.row1 {
            let cy = r / chunk_rows;
            let row_in_chunk = r % chunk_rows;
            for c in window.col0..window.col1 {
                let cx = c / chunk_cols;
                let chunk_idx = (cy - cy0) * chunks_per_row + (cx - cx0);
                if let Some(chunk) = &chunks[chunk_idx] {
                    let col_in_chunk = c % chunk_cols;
                    data[(r - window.row0) * width + (c - window.col0)] =
                        chunk[row_in_chunk * chunk_cols + col_in_chunk];
                }
            }
        }

        Ok(Slice {
            data,
            width,
            height,
            units: meta.units,
            description: meta.description,
        })
    }

    /// Reduce the full variable grid to its (min, max) extent.
    ///
    /// Streams the chunk grid one chunk-row batch at a time; NaN samples
    /// are ignored. A variable with no finite samples reduces to `(0, 0)`.
    pub async fn reduce_extent(&self, variable: &str) -> TileResult<Extent> {
        let meta = self.meta(variable).await?;
        let (chunk_grid_rows, chunk_grid_cols) = meta.chunk_grid();
        let chunk_len = meta.chunk_shape[0] * meta.chunk_shape[1];

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for cy in 0..chunk_grid_rows {
            let keys: Vec<String> = (0..chunk_grid_cols)
                .map(|cx| self.chunk_key(variable, cy, cx))
                .collect();

            for raw in self.store.get_many(&keys).await?.into_iter().flatten() {
                let values = decode_chunk(&raw, chunk_len)?;
                for v in values {
                    if v.is_nan() {
                        continue;
                    }
                    min = min.min(v);
                    max = max.max(v);
                }
            }
        }

        if min > max {
            return Ok(Extent { min: 0.0, max: 0.0 });
        }
        Ok(Extent { min, max })
    }

    /// Write a full variable grid, replacing any previous contents.
    pub async fn write_array(&self, variable: &str, grid: &ArrayGrid) -> TileResult<()> {
        let meta = &grid.meta;
        let [rows, cols] = meta.shape;
        let [chunk_rows, chunk_cols] = meta.chunk_shape;
        if grid.data.len() != rows * cols {
            return Err(TileError::InternalError(format!(
                "grid data length {} does not match shape {}x{}",
                grid.data.len(),
                rows,
                cols
            )));
        }

        self.store
            .delete_prefix(&format!("{}/{}/", self.prefix, variable))
            .await?;

        let (chunk_grid_rows, chunk_grid_cols) = meta.chunk_grid();
        for cy in 0..chunk_grid_rows {
            for cx in 0..chunk_grid_cols {
                let mut chunk = vec![f32::NAN; chunk_rows * chunk_cols];
                for r in 0..chunk_rows {
                    let src_row = cy * chunk_rows + r;
                    if src_row >= rows {
                        break;
                    }
                    for c in 0..chunk_cols {
                        let src_col = cx * chunk_cols + c;
                        if src_col >= cols {
                            break;
                        }
                        chunk[r * chunk_cols + c] = grid.data[src_row * cols + src_col];
                    }
                }
                let encoded = encode_chunk(&chunk)?;
                self.store
                    .put(&self.chunk_key(variable, cy, cx), encoded)
                    .await?;
            }
        }

        let meta_json = serde_json::to_vec(meta)
            .map_err(|e| TileError::InternalError(format!("array metadata: {}", e)))?;
        self.store
            .put(&self.meta_key(variable), Bytes::from(meta_json))
            .await?;

        Ok(())
    }

    /// Replace the variable list for this prefix.
    pub async fn set_variables(&self, names: &[String]) -> TileResult<()> {
        let raw = serde_json::to_vec(names)
            .map_err(|e| TileError::InternalError(format!("variable list: {}", e)))?;
        self.store.put(&self.vars_key(), Bytes::from(raw)).await
    }

    /// Delete everything stored under this prefix.
    pub async fn clear(&self) -> TileResult<u64> {
        self.store.delete_prefix(&format!("{}/", self.prefix)).await
    }
}

/// Convert a geographic bbox into a half-open row/col window.
///
/// Returns `None` when the bbox misses the grid entirely.
fn window_for_bbox(meta: &ArrayMeta, bbox: &BoundingBox) -> Option<Window> {
    let [rows, cols] = meta.shape;

    // Latitude is descending: row index grows southward, so the window
    // starts at the bbox's *northern* edge.
    let row0 = ((bbox.max_lat - meta.lat_start) / meta.lat_step).floor();
    let row1 = ((bbox.min_lat - meta.lat_start) / meta.lat_step).ceil();
    let col0 = ((bbox.min_lon - meta.lon_start) / meta.lon_step).floor();
    let col1 = ((bbox.max_lon - meta.lon_start) / meta.lon_step).ceil();

    let row0 = row0.max(0.0) as usize;
    let row1 = (row1.max(0.0) as usize).min(rows);
    let col0 = col0.max(0.0) as usize;
    let col1 = (col1.max(0.0) as usize).min(cols);

    if row0 >= row1 || col0 >= col1 {
        return None;
    }

    Some(Window {
        row0,
        row1,
        col0,
        col1,
    })
}

fn reduce_extent_values(values: &[f32]) -> Extent {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        if v.is_nan() {
            continue;
        }
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        return Extent { min: 0.0, max: 0.0 };
    }
    Extent { min, max }
}

fn encode_chunk(values: &[f32]) -> TileResult<Bytes> {
    let mut raw = Vec::with_capacity(values.len() * 4);
    for v in values {
        raw.extend_from_slice(&v.to_le_bytes());
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(&raw)
        .map_err(|e| TileError::InternalError(format!("chunk compression: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| TileError::InternalError(format!("chunk compression: {}", e)))?;
    Ok(Bytes::from(compressed))
}

fn decode_chunk(raw: &[u8], expected_len: usize) -> TileResult<Vec<f32>> {
    let mut decoder = ZlibDecoder::new(raw);
    let mut bytes = Vec::with_capacity(expected_len * 4);
    decoder
        .read_to_end(&mut bytes)
        .map_err(|e| TileError::DataReadError(format!("chunk decompression: {}", e)))?;

    if bytes.len() != expected_len * 4 {
        return Err(TileError::DataReadError(format!(
            "chunk has {} bytes, expected {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
