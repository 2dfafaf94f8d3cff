//! Error types shared by the raster primitives.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Errors raised while building or validating raster primitives.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("Degenerate geotransform: {0}")]
    DegenerateTransform(String),

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),
}
