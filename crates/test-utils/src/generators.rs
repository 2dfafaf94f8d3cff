//! Synthetic rasters with predictable pixel values.
//!
//! All generated rasters are north-up with square pixels.

use tile_common::{BoolGrid, GeoTransform, Pixel, RasterDataset};

/// Pixel size used by generated rasters unless stated otherwise.
pub const PIXEL_SIZE: f64 = 30.0;

/// North-up transform with the upper-left corner at `(origin_x, origin_y)`.
pub fn north_up(origin_x: f64, origin_y: f64, pixel_size: f64) -> GeoTransform {
    GeoTransform::north_up(origin_x, origin_y, pixel_size, -pixel_size)
        .unwrap_or_else(|e| panic!("invalid test transform: {}", e))
}

/// Creates values where each cell is `col * 100 + row + 1`.
///
/// The `+ 1` keeps every value distinct from a zero no-data sentinel.
///
/// # Example
///
/// ```
/// use test_utils::create_test_values;
///
/// let values = create_test_values(3, 2);
/// assert_eq!(values, vec![1, 101, 201, 2, 102, 202]);
/// ```
pub fn create_test_values(width: usize, height: usize) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 100 + row + 1) as u16);
        }
    }
    data
}

/// Single-band raster filled with one value.
pub fn constant_raster<T: Pixel>(
    origin: (f64, f64),
    width: usize,
    height: usize,
    value: T,
    nodata: f64,
) -> RasterDataset {
    raster_from_values(origin, width, height, nodata, vec![vec![value; width * height]])
}

/// Raster from typed band values at [`PIXEL_SIZE`].
pub fn raster_from_values<T: Pixel>(
    origin: (f64, f64),
    width: usize,
    height: usize,
    nodata: f64,
    bands: Vec<Vec<T>>,
) -> RasterDataset {
    RasterDataset::from_bands(
        width,
        height,
        north_up(origin.0, origin.1, PIXEL_SIZE),
        nodata,
        bands,
    )
    .unwrap_or_else(|e| panic!("invalid test raster: {}", e))
}

/// `uint16` raster of [`create_test_values`] repeated across `band_count` bands,
/// with band `b` offset by `b * 10000`.
pub fn gradient_raster(
    origin: (f64, f64),
    width: usize,
    height: usize,
    band_count: usize,
) -> RasterDataset {
    let base = create_test_values(width, height);
    let bands = (0..band_count)
        .map(|b| base.iter().map(|v| v + (b as u16) * 10000).collect())
        .collect();
    raster_from_values(origin, width, height, 0.0, bands)
}

/// Mask built from a predicate over `(col, row)`.
pub fn mask_from_fn(
    width: usize,
    height: usize,
    valid: impl Fn(usize, usize) -> bool,
) -> BoolGrid {
    let cells = (0..height)
        .flat_map(|row| (0..width).map(move |col| (col, row)))
        .map(|(col, row)| valid(col, row))
        .collect();
    BoolGrid::new(width, height, cells).unwrap_or_else(|e| panic!("invalid test mask: {}", e))
}
