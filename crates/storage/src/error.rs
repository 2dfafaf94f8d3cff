//! Error types for tile persistence.

use thiserror::Error;

use tile_common::TileError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tile not found: {0}")]
    NotFound(String),

    #[error("Malformed tile file: {0}")]
    Format(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<TileError> for StorageError {
    fn from(err: TileError) -> Self {
        StorageError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Catalog(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
