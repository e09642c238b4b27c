//! The tile rendering and metadata pipeline.
//!
//! Control flow for a render: resolve the tile's bbox, slice the variable
//! from the store, look up the dataset-wide extent, normalize to 8-bit
//! intensities, optionally map through a colormap gradient, and encode as
//! PNG. Each stage's result is memoized by the single-flight caches so
//! identical and concurrent requests share one computation.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use renderer::{apply_gradient, normalize, png, resample_bilinear, Rgb};
use storage::Extent;
use tiles_common::{tile_bbox, TileCoord, TileResult, TILE_SIZE};

use crate::caches::internal_error;
use crate::state::{AppState, MetadataKey, RenderKey};

/// Render (or fetch from cache) the PNG tile for a request.
///
/// `colormap` is the optional colormap name; unknown names fall back to
/// grayscale rather than failing the request.
pub async fn render_tile(
    state: Arc<AppState>,
    prefix: String,
    variable: String,
    coord: TileCoord,
    colormap: Option<String>,
) -> TileResult<Bytes> {
    let key = RenderKey {
        prefix: prefix.clone(),
        variable: variable.clone(),
        coord,
        colormap: colormap.clone().unwrap_or_default(),
    };

    let compute_state = Arc::clone(&state);
    state
        .render_cache
        .get_or_compute(key, move || {
            compute_render(compute_state, prefix, variable, coord, colormap)
        })
        .await
}

async fn compute_render(
    state: Arc<AppState>,
    prefix: String,
    variable: String,
    coord: TileCoord,
    colormap: Option<String>,
) -> TileResult<Bytes> {
    debug!(%prefix, %variable, tile = %coord, "rendering tile");

    let bbox = tile_bbox(&coord);
    let dataset = state.registry.get_or_open(&prefix).await;
    let slice = dataset.read_slice(&variable, &bbox).await?;
    let extent = dataset_extent(&state, &prefix, &variable).await?;

    // Resolve the colormap before leaving the async context; a miss is a
    // warning, not an error.
    let stops: Option<Vec<Rgb>> = match colormap.as_deref() {
        None | Some("") => None,
        Some(name) => match state.colormaps.get(name) {
            Some(stops) => Some(stops.to_vec()),
            None => {
                warn!(colormap = name, "unknown colormap, falling back to grayscale");
                None
            }
        },
    };
    let lut = match stops {
        Some(stops) => Some(state.gradients.get_or_build(&stops)?),
        None => None,
    };

    // Normalization, resampling and encoding are CPU-bound; keep them off
    // the request dispatch threads.
    let encoded = tokio::task::spawn_blocking(move || {
        let intensities = normalize(&slice.data, extent.min, extent.max);
        let raster =
            resample_bilinear(&intensities, slice.width, slice.height, TILE_SIZE, TILE_SIZE);

        match lut {
            Some(lut) => {
                let canvas = apply_gradient(&lut, &raster);
                png::encode_rgb(&canvas, TILE_SIZE, TILE_SIZE)
            }
            None => png::encode_gray(&raster, TILE_SIZE, TILE_SIZE),
        }
    })
    .await
    .map_err(|e| internal_error("render task failed", e))??;

    Ok(Bytes::from(encoded))
}

/// Fetch (or compute once) the metadata record for a tile.
pub async fn tile_metadata(
    state: Arc<AppState>,
    prefix: String,
    variable: String,
    coord: TileCoord,
) -> TileResult<serde_json::Value> {
    let key = MetadataKey {
        prefix: prefix.clone(),
        variable: variable.clone(),
        coord,
    };

    let compute_state = Arc::clone(&state);
    state
        .metadata_cache
        .get_or_compute(key, move || {
            compute_metadata(compute_state, prefix, variable, coord)
        })
        .await
}

async fn compute_metadata(
    state: Arc<AppState>,
    prefix: String,
    variable: String,
    coord: TileCoord,
) -> TileResult<serde_json::Value> {
    let bbox = tile_bbox(&coord);
    let dataset = state.registry.get_or_open(&prefix).await;
    let slice = dataset.read_slice(&variable, &bbox).await?;

    // The metadata record reports the tile-local extent; the dataset-wide
    // extent only drives render normalization.
    let local = slice.extent();

    let mut record = serde_json::Map::new();
    record.insert("variable".to_string(), variable.clone().into());
    record.insert("z".to_string(), coord.z.into());
    record.insert("x".to_string(), coord.x.into());
    record.insert("y".to_string(), coord.y.into());
    record.insert(
        "lats".to_string(),
        serde_json::json!([bbox.min_lat, bbox.max_lat]),
    );
    record.insert(
        "lons".to_string(),
        serde_json::json!([bbox.min_lon, bbox.max_lon]),
    );
    record.insert(format!("{}Max", variable), (local.max as f64).into());
    record.insert(format!("{}Min", variable), (local.min as f64).into());
    record.insert("units".to_string(), slice.units.into());
    record.insert("description".to_string(), slice.description.into());

    Ok(serde_json::Value::Object(record))
}

/// Dataset-wide extent for a variable, memoized per (prefix, variable).
pub async fn dataset_extent(
    state: &Arc<AppState>,
    prefix: &str,
    variable: &str,
) -> TileResult<Extent> {
    let key = (prefix.to_string(), variable.to_string());
    let dataset = state.registry.get_or_open(prefix).await;
    let variable = variable.to_string();

    state
        .extent_cache
        .get_or_compute(key, move || async move {
            dataset.reduce_extent(&variable).await
        })
        .await
}
