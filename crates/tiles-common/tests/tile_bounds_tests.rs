//! Exhaustive checks of tile-to-bbox resolution across zoom levels.

use tiles_common::tile::{latlon_to_tile, tile_bbox, TileCoord};

// ============================================================================
// Structural properties over the full grid
// ============================================================================

#[test]
fn test_bounds_ordered_for_every_tile_up_to_zoom_five() {
    for z in 0..=5u32 {
        let n = 1u32 << z;
        for x in 0..n {
            for y in 0..n {
                let bbox = tile_bbox(&TileCoord::new(z, x, y));
                assert!(bbox.min_lon < bbox.max_lon, "tile {}/{}/{}", z, x, y);
                assert!(bbox.min_lat < bbox.max_lat, "tile {}/{}/{}", z, x, y);
            }
        }
    }
}

#[test]
fn test_row_of_tiles_partitions_longitude() {
    let z = 4u32;
    let n = 1u32 << z;
    let mut cursor = -180.0f64;
    for x in 0..n {
        let bbox = tile_bbox(&TileCoord::new(z, x, 3));
        assert!((bbox.min_lon - cursor).abs() < 1e-9);
        cursor = bbox.max_lon;
    }
    assert!((cursor - 180.0).abs() < 1e-9);
}

#[test]
fn test_column_of_tiles_descends_latitude() {
    let z = 4u32;
    let n = 1u32 << z;
    let mut previous_min: Option<f64> = None;
    for y in 0..n {
        let bbox = tile_bbox(&TileCoord::new(z, 5, y));
        if let Some(previous_min) = previous_min {
            // Each row starts exactly where the previous one ended.
            assert!((bbox.max_lat - previous_min).abs() < 1e-9);
        }
        previous_min = Some(bbox.min_lat);
    }
}

#[test]
fn test_children_cover_parent() {
    let parent = TileCoord::new(3, 5, 2);
    let parent_bbox = tile_bbox(&parent);

    for child in parent.children() {
        let child_bbox = tile_bbox(&child);
        assert!(child_bbox.min_lon >= parent_bbox.min_lon - 1e-9);
        assert!(child_bbox.max_lon <= parent_bbox.max_lon + 1e-9);
        assert!(child_bbox.min_lat >= parent_bbox.min_lat - 1e-9);
        assert!(child_bbox.max_lat <= parent_bbox.max_lat + 1e-9);
    }
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_tile_center_maps_back_to_tile() {
    for z in 1..=6u32 {
        let n = 1u32 << z;
        for &(x, y) in &[(0, 0), (n / 2, n / 2), (n - 1, n - 1)] {
            let coord = TileCoord::new(z, x, y);
            let bbox = tile_bbox(&coord);
            let center_lon = (bbox.min_lon + bbox.max_lon) / 2.0;
            let center_lat = (bbox.min_lat + bbox.max_lat) / 2.0;
            assert_eq!(latlon_to_tile(center_lat, center_lon, z), coord);
        }
    }
}
