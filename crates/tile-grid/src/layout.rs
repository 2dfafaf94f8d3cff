//! Pixel layouts of tile rasters on the shared lattice.
//!
//! Every tile raster uses the same pixel size and the same pixel phase:
//! tile origins are snapped outward onto a lattice anchored at a single
//! grid origin, so neighbouring tiles line up pixel for pixel.

use serde::{Deserialize, Serialize};

use tile_common::{BoundingBox, GeoTransform};

use crate::error::{Result, TileGridError};
use crate::grid::TilePolygon;

/// Tolerance, in pixels, for treating an envelope edge as already on the lattice.
const SNAP_EPSILON: f64 = 1e-6;

/// The pixel lattice shared by all tile rasters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLattice {
    /// Square pixel size in map units.
    pub pixel_size: f64,
    /// X coordinate of one lattice node.
    pub origin_x: f64,
    /// Y coordinate of one lattice node.
    pub origin_y: f64,
}

impl Default for GridLattice {
    fn default() -> Self {
        Self {
            pixel_size: 30.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl GridLattice {
    pub fn new(pixel_size: f64, origin_x: f64, origin_y: f64) -> Self {
        Self {
            pixel_size,
            origin_x,
            origin_y,
        }
    }

    /// Validate the lattice parameters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.pixel_size.is_finite() && self.pixel_size > 0.0) {
            return Err(format!("pixel_size must be > 0, got {}", self.pixel_size));
        }
        if !(self.origin_x.is_finite() && self.origin_y.is_finite()) {
            return Err("lattice origin must be finite".to_string());
        }
        Ok(())
    }

    /// Lattice line at or below `value` along one axis.
    fn snap_down(&self, value: f64, origin: f64) -> f64 {
        let steps = ((value - origin) / self.pixel_size + SNAP_EPSILON).floor();
        origin + steps * self.pixel_size
    }

    /// Lattice line at or above `value` along one axis.
    fn snap_up(&self, value: f64, origin: f64) -> f64 {
        let steps = ((value - origin) / self.pixel_size - SNAP_EPSILON).ceil();
        origin + steps * self.pixel_size
    }

    /// Layout of the raster backing `tile`.
    pub fn layout_for(&self, tile: &TilePolygon) -> Result<TileLayout> {
        self.validate()
            .map_err(|msg| TileGridError::invalid_tile(tile.id(), msg))?;

        let env = tile.envelope();
        let min_x = self.snap_down(env.min_x, self.origin_x);
        let max_x = self.snap_up(env.max_x, self.origin_x);
        let min_y = self.snap_down(env.min_y, self.origin_y);
        let max_y = self.snap_up(env.max_y, self.origin_y);

        let width = ((max_x - min_x) / self.pixel_size).round() as usize;
        let height = ((max_y - min_y) / self.pixel_size).round() as usize;
        if width == 0 || height == 0 {
            return Err(TileGridError::invalid_tile(
                tile.id(),
                "tile is smaller than one pixel",
            ));
        }

        let geotransform = GeoTransform::north_up(min_x, max_y, self.pixel_size, -self.pixel_size)
            .map_err(|e| TileGridError::invalid_tile(tile.id(), e.to_string()))?;

        Ok(TileLayout {
            tile_id: tile.id().to_string(),
            geotransform,
            width,
            height,
        })
    }
}

/// Fixed extent and pixel grid of one tile raster.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayout {
    pub tile_id: String,
    pub geotransform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl TileLayout {
    /// Snapped map-space extent of the tile raster.
    pub fn extent(&self) -> BoundingBox {
        self.geotransform.extent(self.width, self.height)
    }
}
