//! Affine mapping between raster pixel indices and map coordinates.
//!
//! Coefficients follow the usual six-term ordering:
//!
//! ```text
//! x = gt[0] + col * gt[1] + row * gt[2]
//! y = gt[3] + col * gt[4] + row * gt[5]
//! ```
//!
//! `(col, row)` address the upper-left corner of a pixel. `gt[5]` is
//! negative for north-up rasters.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{TileError, TileResult};

/// Fraction of a pixel absorbed before flooring in [`GeoTransform::to_pixel`].
const PIXEL_EPSILON: f64 = 1e-6;

/// Determinants below this are treated as singular.
const MIN_DETERMINANT: f64 = 1e-12;

/// Validated affine geotransform with its precomputed inverse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 6]", into = "[f64; 6]")]
pub struct GeoTransform {
    forward: [f64; 6],
    inverse: [f64; 6],
}

impl GeoTransform {
    /// Build from the six coefficients, rejecting singular transforms.
    pub fn from_coefficients(gt: [f64; 6]) -> TileResult<Self> {
        if gt.iter().any(|c| !c.is_finite()) {
            return Err(TileError::DegenerateTransform(format!(
                "non-finite coefficient in {:?}",
                gt
            )));
        }

        let det = gt[1] * gt[5] - gt[2] * gt[4];
        if det.abs() < MIN_DETERMINANT {
            return Err(TileError::DegenerateTransform(format!(
                "determinant is zero for {:?}",
                gt
            )));
        }

        let inv_det = 1.0 / det;
        let inverse = [
            (gt[2] * gt[3] - gt[5] * gt[0]) * inv_det,
            gt[5] * inv_det,
            -gt[2] * inv_det,
            (gt[4] * gt[0] - gt[1] * gt[3]) * inv_det,
            -gt[4] * inv_det,
            gt[1] * inv_det,
        ];

        Ok(Self {
            forward: gt,
            inverse,
        })
    }

    /// North-up transform with square or rectangular pixels.
    ///
    /// `pixel_height` is normally negative.
    pub fn north_up(
        origin_x: f64,
        origin_y: f64,
        pixel_width: f64,
        pixel_height: f64,
    ) -> TileResult<Self> {
        Self::from_coefficients([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    /// The six forward coefficients.
    pub fn coefficients(&self) -> [f64; 6] {
        self.forward
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.forward[0], self.forward[3])
    }

    /// Pixel width and (signed) pixel height.
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.forward[1], self.forward[5])
    }

    /// True when both rotation terms are zero and rows run north to south.
    pub fn is_north_up(&self) -> bool {
        self.forward[2] == 0.0 && self.forward[4] == 0.0 && self.forward[5] < 0.0
    }

    /// Map coordinates of the upper-left corner of pixel `(col, row)`.
    pub fn to_world(&self, col: i64, row: i64) -> (f64, f64) {
        self.to_world_f(col as f64, row as f64)
    }

    fn to_world_f(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.forward;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }

    /// Fractional pixel position of a map coordinate.
    pub fn to_pixel_f(&self, x: f64, y: f64) -> (f64, f64) {
        let inv = &self.inverse;
        (
            inv[0] + x * inv[1] + y * inv[2],
            inv[3] + x * inv[4] + y * inv[5],
        )
    }

    /// Index of the pixel enclosing a map coordinate.
    ///
    /// Floors the inverse mapping after absorbing a tiny tolerance, so
    /// `to_pixel(to_world(c, r)) == (c, r)` holds for integer indices.
    pub fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let (col, row) = self.to_pixel_f(x, y);
        (
            (col + PIXEL_EPSILON).floor() as i64,
            (row + PIXEL_EPSILON).floor() as i64,
        )
    }

    /// Four corners of a `width` x `height` raster, clockwise from upper-left.
    pub fn footprint(&self, width: usize, height: usize) -> [(f64, f64); 4] {
        let (w, h) = (width as f64, height as f64);
        [
            self.to_world_f(0.0, 0.0),
            self.to_world_f(w, 0.0),
            self.to_world_f(w, h),
            self.to_world_f(0.0, h),
        ]
    }

    /// Envelope of a `width` x `height` raster.
    pub fn extent(&self, width: usize, height: usize) -> BoundingBox {
        let corners = self.footprint(width, height);
        let mut bbox = BoundingBox::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1);
        for (x, y) in &corners[1..] {
            bbox.min_x = bbox.min_x.min(*x);
            bbox.min_y = bbox.min_y.min(*y);
            bbox.max_x = bbox.max_x.max(*x);
            bbox.max_y = bbox.max_y.max(*y);
        }
        bbox
    }
}

impl TryFrom<[f64; 6]> for GeoTransform {
    type Error = TileError;

    fn try_from(gt: [f64; 6]) -> TileResult<Self> {
        Self::from_coefficients(gt)
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(gt: GeoTransform) -> Self {
        gt.forward
    }
}
