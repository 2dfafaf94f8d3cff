//! Tile grid fixtures.

use tile_common::BoundingBox;
use tile_grid::{TileGrid, TilePolygon};

/// Square tile with its lower-left corner at `(min_x, min_y)`.
pub fn square_tile(id: &str, min_x: f64, min_y: f64, size: f64) -> TilePolygon {
    TilePolygon::from_bbox(id, BoundingBox::new(min_x, min_y, min_x + size, min_y + size))
        .unwrap_or_else(|e| panic!("invalid test tile: {}", e))
}

/// Two tiles side by side along x, `A` on the left and `B` on the right.
pub fn two_tile_grid(size: f64) -> TileGrid {
    TileGrid::new(vec![
        square_tile("A", 0.0, 0.0, size),
        square_tile("B", size, 0.0, size),
    ])
    .unwrap_or_else(|e| panic!("invalid test grid: {}", e))
}

/// GeoJSON FeatureCollection of square tiles, ids stored under `tile_id`.
pub fn square_grid_geojson(tiles: &[(&str, f64, f64, f64)]) -> String {
    let features: Vec<String> = tiles
        .iter()
        .map(|(id, min_x, min_y, size)| {
            let (max_x, max_y) = (min_x + size, min_y + size);
            format!(
                r#"{{"type": "Feature", "properties": {{"tile_id": "{id}"}}, "geometry": {{"type": "Polygon", "coordinates": [[[{min_x}, {min_y}], [{max_x}, {min_y}], [{max_x}, {max_y}], [{min_x}, {max_y}], [{min_x}, {min_y}]]]}}}}"#
            )
        })
        .collect();
    format!(
        r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
        features.join(", ")
    )
}
