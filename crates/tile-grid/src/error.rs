//! Error types for the tile grid.

use thiserror::Error;

/// Errors raised while loading or querying the tile grid.
#[derive(Error, Debug)]
pub enum TileGridError {
    /// The tile polygon source is missing, unreadable or malformed.
    #[error("tile grid configuration error: {0}")]
    Configuration(String),

    /// A tile polygon cannot yield a raster layout.
    #[error("invalid tile '{tile_id}': {message}")]
    InvalidTile { tile_id: String, message: String },
}

impl TileGridError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an InvalidTile error.
    pub fn invalid_tile(tile_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTile {
            tile_id: tile_id.into(),
            message: message.into(),
        }
    }
}

/// Result type for tile grid operations.
pub type Result<T> = std::result::Result<T, TileGridError>;
