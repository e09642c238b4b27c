//! Web-mercator (XYZ) tile coordinates and their geographic bounds.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// Canonical pixel size of every rendered tile.
pub const TILE_SIZE: usize = 512;

/// A tile coordinate (z/x/y) under the standard web-mercator tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Whether the column/row fall inside the `2^z` grid for this zoom.
    pub fn is_valid(&self) -> bool {
        let n = 1u64 << self.z.min(63);
        (self.x as u64) < n && (self.y as u64) < n
    }

    /// Get the parent tile (zoom - 1).
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// Get the four children tiles (zoom + 1).
    pub fn children(&self) -> [TileCoord; 4] {
        let x = self.x * 2;
        let y = self.y * 2;
        let z = self.z + 1;
        [
            TileCoord { z, x, y },
            TileCoord { z, x: x + 1, y },
            TileCoord { z, x, y: y + 1 },
            TileCoord {
                z,
                x: x + 1,
                y: y + 1,
            },
        ]
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Convert web-mercator tile coordinates to lon/lat bounds.
///
/// Pure and total: out-of-range columns/rows still produce a result (which
/// may fall outside the valid global extent); callers validate tile
/// coordinates against the dataset's coverage.
pub fn tile_bbox(coord: &TileCoord) -> BoundingBox {
    let n = 2f64.powi(coord.z as i32);

    let lon_min = coord.x as f64 / n * 360.0 - 180.0;
    let lon_max = (coord.x as f64 + 1.0) / n * 360.0 - 180.0;

    let lat_max = (std::f64::consts::PI * (1.0 - 2.0 * coord.y as f64 / n))
        .sinh()
        .atan()
        .to_degrees();
    let lat_min = (std::f64::consts::PI * (1.0 - 2.0 * (coord.y as f64 + 1.0) / n))
        .sinh()
        .atan()
        .to_degrees();

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}

/// Convert lat/lon to the web-mercator tile containing it.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let n = 2f64.powi(zoom as i32);

    let x = ((lon + 180.0) / 360.0 * n).floor() as u32;
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n).floor() as u32;

    TileCoord { z: zoom, x, y }
}
