//! Ingestion orchestration: parsed upload → chunked store.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};

use storage::{ArrayGrid, ArrayMeta, DatasetRegistry, DEFAULT_CHUNK_SIZE};

use crate::error::{IngestionError, Result};
use crate::upload::{parse_netcdf, GridFile};

/// Outcome of a completed ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionResult {
    /// Size of the uploaded file in bytes.
    pub file_size: usize,
    /// Names of the variables written to the store.
    pub variables: Vec<String>,
}

/// One-shot ingestion of uploads into the chunked store.
///
/// Not on the tile-serving hot path. Concurrent ingests to the same prefix
/// may interleave non-deterministically; callers are expected to serialize
/// them.
pub struct Ingester {
    registry: Arc<DatasetRegistry>,
}

impl Ingester {
    pub fn new(registry: Arc<DatasetRegistry>) -> Self {
        Self { registry }
    }

    /// Ingest an uploaded NetCDF file under `prefix`, replacing any prior
    /// contents there.
    ///
    /// Parsing runs on the blocking pool (libnetcdf I/O); the write path is
    /// async against the store.
    pub async fn ingest(&self, prefix: &str, data: Bytes) -> Result<IngestionResult> {
        let file_size = data.len();

        let parsed = tokio::task::spawn_blocking(move || parse_netcdf(&data))
            .await
            .map_err(|e| IngestionError::NetcdfParse(format!("parse task failed: {}", e)))??;

        let grid_file = parsed.canonicalize();
        let result = self.ingest_grid(prefix, grid_file, file_size).await?;

        info!(
            prefix,
            file_size,
            variables = ?result.variables,
            "ingestion complete"
        );
        Ok(result)
    }

    /// Write an already-parsed (and canonicalized) grid file to the store.
    pub async fn ingest_grid(
        &self,
        prefix: &str,
        grid_file: GridFile,
        file_size: usize,
    ) -> Result<IngestionResult> {
        let rows = grid_file.lat.len();
        let cols = grid_file.lon.len();
        if rows < 2 || cols < 2 {
            return Err(IngestionError::GridTooSmall(format!(
                "{}x{} grid; need at least 2x2",
                rows, cols
            )));
        }

        let lat_step = (grid_file.lat[rows - 1] - grid_file.lat[0]) / (rows - 1) as f64;
        let lon_step = (grid_file.lon[cols - 1] - grid_file.lon[0]) / (cols - 1) as f64;
        if lat_step >= 0.0 {
            // canonicalize() should have flipped this already
            return Err(IngestionError::NetcdfParse(
                "latitude axis is not descending".to_string(),
            ));
        }

        let dataset = self.registry.get_or_open(prefix).await;
        dataset.clear().await.map_err(IngestionError::StoreWrite)?;

        let mut names = Vec::with_capacity(grid_file.variables.len());
        for variable in grid_file.variables {
            if variable.data.len() != rows * cols {
                warn!(
                    variable = %variable.name,
                    expected = rows * cols,
                    actual = variable.data.len(),
                    "skipping variable with mismatched sample count"
                );
                continue;
            }

            let grid = ArrayGrid {
                data: variable.data,
                meta: ArrayMeta {
                    shape: [rows, cols],
                    chunk_shape: [
                        DEFAULT_CHUNK_SIZE.min(rows),
                        DEFAULT_CHUNK_SIZE.min(cols),
                    ],
                    lat_start: grid_file.lat[0],
                    lat_step,
                    lon_start: grid_file.lon[0],
                    lon_step,
                    units: variable.units,
                    description: variable.description,
                },
            };

            dataset
                .write_array(&variable.name, &grid)
                .await
                .map_err(IngestionError::StoreWrite)?;
            names.push(variable.name);
        }

        if names.is_empty() {
            return Err(IngestionError::NoVariables);
        }

        dataset
            .set_variables(&names)
            .await
            .map_err(IngestionError::StoreWrite)?;

        Ok(IngestionResult {
            file_size,
            variables: names,
        })
    }
}
