//! Shared test utilities for the tile mosaic workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Raster and mask generators with predictable pixel values
//! - Tile grid fixtures (square tiles, small grids, GeoJSON text)
//! - Temporary directory helpers
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Assert that two rasters hold byte-identical bands.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_bands_eq;
///
/// assert_bands_eq!(merged, expected);
/// ```
#[macro_export]
macro_rules! assert_bands_eq {
    ($left:expr, $right:expr) => {{
        let left = &$left;
        let right = &$right;
        assert_eq!(
            left.band_count(),
            right.band_count(),
            "band counts differ"
        );
        for band in 0..left.band_count() {
            assert_eq!(left.band(band), right.band(band), "band {} differs", band);
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ~ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
