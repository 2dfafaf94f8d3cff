//! Error types for the ingestion crate.

use thiserror::Error;

use storage::StorageError;
use tile_common::TileError;
use tile_grid::TileGridError;

/// Errors that abort a whole scene or the whole run.
///
/// Per-tile failures are not errors at this level; they are reported as
/// `Failed` entries in the [`IngestionReport`](crate::IngestionReport).
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Tile grid or settings are unusable. Fatal to the whole run.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The scene cannot be ingested as given.
    #[error("Invalid ingestion request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read scene: {0}")]
    Scene(#[from] StorageError),

    #[error("Invalid raster: {0}")]
    Raster(#[from] TileError),
}

impl From<TileGridError> for IngestionError {
    fn from(err: TileGridError) -> Self {
        IngestionError::Configuration(err.to_string())
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
