//! Overlap windows between a tile raster and a source scene.
//!
//! The overlap is computed in map space and then converted into pixel
//! windows in both rasters. Indices are clamped to each raster's valid
//! range, and the two windows always have the same width and height.

use tile_common::{GeoTransform, RasterDataset};
use tile_grid::TileLayout;

/// Fraction of a pixel pulled back from the far overlap edge, so an edge
/// lying exactly on a pixel boundary selects the pixel before it.
const FAR_EDGE_INSET: f64 = 1e-3;

/// Default relative tolerance when comparing pixel sizes.
pub const DEFAULT_RESOLUTION_TOLERANCE: f64 = 1e-6;

/// A rectangular block of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

/// Aligned windows in the destination tile and the source scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipWindows {
    pub dest: PixelWindow,
    pub src: PixelWindow,
}

impl ClipWindows {
    /// Build from the upper-left pixel in each raster and a shared size.
    pub fn new(dest: (usize, usize), src: (usize, usize), width: usize, height: usize) -> Self {
        Self {
            dest: PixelWindow {
                col: dest.0,
                row: dest.1,
                width,
                height,
            },
            src: PixelWindow {
                col: src.0,
                row: src.1,
                width,
                height,
            },
        }
    }

    pub fn width(&self) -> usize {
        self.dest.width
    }

    pub fn height(&self) -> usize {
        self.dest.height
    }

    pub fn pixel_count(&self) -> usize {
        self.dest.width * self.dest.height
    }
}

/// Why two rasters cannot be clipped against each other.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipError {
    /// Pixel sizes differ; the source must be resampled first.
    ResolutionMismatch { tile: (f64, f64), source: (f64, f64) },
    /// One raster is rotated or not north-up.
    UnsupportedTransform(String),
}

/// Computes overlap windows between tile layouts and source scenes.
#[derive(Debug, Clone, Copy)]
pub struct FootprintClipper {
    resolution_tolerance: f64,
}

impl Default for FootprintClipper {
    fn default() -> Self {
        Self {
            resolution_tolerance: DEFAULT_RESOLUTION_TOLERANCE,
        }
    }
}

impl FootprintClipper {
    pub fn new(resolution_tolerance: f64) -> Self {
        Self {
            resolution_tolerance,
        }
    }

    /// Overlap windows of `source` within the tile, or `None` when they do
    /// not overlap.
    ///
    /// Rasters that merely share an edge do not overlap. A one pixel wide
    /// overlap yields a one pixel wide window.
    pub fn clip(
        &self,
        layout: &TileLayout,
        source: &RasterDataset,
    ) -> Result<Option<ClipWindows>, ClipError> {
        let tile_gt = &layout.geotransform;
        let src_gt = source.geotransform();

        if !tile_gt.is_north_up() {
            return Err(ClipError::UnsupportedTransform(format!(
                "tile geotransform {:?} is not north-up",
                tile_gt.coefficients()
            )));
        }
        if !src_gt.is_north_up() {
            return Err(ClipError::UnsupportedTransform(format!(
                "source geotransform {:?} is not north-up",
                src_gt.coefficients()
            )));
        }

        let tile_px = tile_gt.pixel_size();
        let src_px = src_gt.pixel_size();
        if !self.same_size(tile_px.0, src_px.0) || !self.same_size(tile_px.1, src_px.1) {
            return Err(ClipError::ResolutionMismatch {
                tile: tile_px,
                source: src_px,
            });
        }

        let Some(overlap) = layout.extent().intersection(&source.extent()) else {
            return Ok(None);
        };

        let inset_x = FAR_EDGE_INSET * tile_px.0.abs();
        let inset_y = FAR_EDGE_INSET * tile_px.1.abs();
        let near = (overlap.min_x, overlap.max_y);
        let far = (overlap.max_x - inset_x, overlap.min_y + inset_y);

        let Some(dest) = pixel_span(tile_gt, near, far, layout.width, layout.height) else {
            return Ok(None);
        };
        let Some(src) = pixel_span(src_gt, near, far, source.width(), source.height()) else {
            return Ok(None);
        };

        let width = dest.2.min(src.2);
        let height = dest.3.min(src.3);
        Ok(Some(ClipWindows::new(
            (dest.0, dest.1),
            (src.0, src.1),
            width,
            height,
        )))
    }

    fn same_size(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.resolution_tolerance * a.abs().max(b.abs())
    }
}

/// First column and row plus pixel counts covered between two map points,
/// clamped to a `width` x `height` raster.
fn pixel_span(
    gt: &GeoTransform,
    near: (f64, f64),
    far: (f64, f64),
    width: usize,
    height: usize,
) -> Option<(usize, usize, usize, usize)> {
    let clamp = |v: i64, len: usize| v.clamp(0, len as i64 - 1);

    let (c0, r0) = gt.to_pixel(near.0, near.1);
    let (c1, r1) = gt.to_pixel(far.0, far.1);
    let (c0, c1) = (clamp(c0, width), clamp(c1, width));
    let (r0, r1) = (clamp(r0, height), clamp(r1, height));

    if c1 < c0 || r1 < r0 {
        return None;
    }
    Some((
        c0 as usize,
        r0 as usize,
        (c1 - c0 + 1) as usize,
        (r1 - r0 + 1) as usize,
    ))
}
