//! Piecewise-linear color gradients over 8-bit intensities.
//!
//! A gradient is built from an ordered list of RGB stops. Between each
//! adjacent pair, `255 / (stops - 1)` interpolated entries (integer
//! division, endpoints inclusive) are generated and concatenated in stop
//! order. The integer division can leave the table a few entries short of
//! 256; lookups at or beyond the table length resolve to the final entry,
//! so every `u8` intensity has a defined color.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use tiles_common::{TileError, TileResult};

/// An RGB color stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// A built gradient lookup table addressed by intensity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradientLut {
    table: Vec<Rgb>,
}

impl GradientLut {
    /// Number of interpolated entries actually stored (≤ 256).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Color for an intensity.
    ///
    /// Intensities at or beyond the table length (the residual lost to
    /// integer step truncation) resolve to the final entry.
    pub fn color_for(&self, intensity: u8) -> Rgb {
        self.table
            .get(intensity as usize)
            .copied()
            .unwrap_or_else(|| self.table[self.table.len() - 1])
    }
}

/// Build a gradient lookup table from an ordered stop list.
///
/// Requires 2..=128 stops: fewer leaves nothing to interpolate, more
/// would drive the per-segment step count below two.
pub fn build_gradient(stops: &[Rgb]) -> TileResult<GradientLut> {
    if stops.len() < 2 {
        return Err(TileError::InternalError(format!(
            "gradient needs at least 2 stops, got {}",
            stops.len()
        )));
    }

    let steps = 255 / (stops.len() - 1);
    if steps < 2 {
        return Err(TileError::InternalError(format!(
            "gradient with {} stops leaves no room to interpolate",
            stops.len()
        )));
    }

    let mut table = Vec::with_capacity(steps * (stops.len() - 1));
    for pair in stops.windows(2) {
        interpolate_segment(pair[0], pair[1], steps, &mut table);
    }

    Ok(GradientLut { table })
}

/// Append `steps` interpolated entries for one segment, endpoints
/// inclusive, truncating each channel toward zero.
fn interpolate_segment(from: Rgb, to: Rgb, steps: usize, table: &mut Vec<Rgb>) {
    for j in 0..steps {
        let t = j as f32 / (steps - 1) as f32;
        table.push(Rgb(
            lerp_channel(from.0, to.0, t),
            lerp_channel(from.1, to.1, t),
            lerp_channel(from.2, to.2, t),
        ));
    }
}

fn lerp_channel(from: u8, to: u8, t: f32) -> u8 {
    (from as f32 + (to as f32 - from as f32) * t) as u8
}

/// Map an intensity raster through a gradient table into packed RGB.
pub fn apply_gradient(lut: &GradientLut, intensities: &[u8]) -> Vec<u8> {
    let mut canvas = Vec::with_capacity(intensities.len() * 3);
    for &intensity in intensities {
        let Rgb(r, g, b) = lut.color_for(intensity);
        canvas.push(r);
        canvas.push(g);
        canvas.push(b);
    }
    canvas
}

/// Memoizes built gradient tables keyed by the stop list value.
///
/// Injected through application state so repeated requests for the same
/// named colormap never rebuild the table.
#[derive(Default)]
pub struct GradientCache {
    built: RwLock<HashMap<Vec<Rgb>, Arc<GradientLut>>>,
}

impl GradientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the built table for a stop list, building it on first use.
    pub fn get_or_build(&self, stops: &[Rgb]) -> TileResult<Arc<GradientLut>> {
        {
            let built = self.built.read().expect("gradient cache poisoned");
            if let Some(lut) = built.get(stops) {
                return Ok(Arc::clone(lut));
            }
        }

        let lut = Arc::new(build_gradient(stops)?);

        let mut built = self.built.write().expect("gradient cache poisoned");
        // A racing builder may have inserted meanwhile; keep the first.
        let entry = built
            .entry(stops.to_vec())
            .or_insert_with(|| Arc::clone(&lut));
        Ok(Arc::clone(entry))
    }

    /// Number of distinct stop lists built so far.
    pub fn len(&self) -> usize {
        self.built.read().expect("gradient cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
