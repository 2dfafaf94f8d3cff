//! Error types for compositing a scene into a tile.

use thiserror::Error;

use storage::StorageError;
use tile_common::DataType;

/// Failure of one (scene, tile) compositing attempt.
///
/// The destination tile is never modified when one of these is returned.
#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("element type mismatch for tile '{tile_id}' and source '{source_id}': tile holds {expected}, source holds {found}")]
    TypeMismatch {
        tile_id: String,
        source_id: String,
        expected: DataType,
        found: DataType,
    },

    #[error("shape mismatch for tile '{tile_id}' and source '{source_id}': expected {expected}, found {found}")]
    ShapeMismatch {
        tile_id: String,
        source_id: String,
        expected: String,
        found: String,
    },

    #[error("pixel size mismatch for tile '{tile_id}' and source '{source_id}': tile {tile:?}, source {found:?}")]
    ResolutionMismatch {
        tile_id: String,
        source_id: String,
        tile: (f64, f64),
        found: (f64, f64),
    },

    #[error("unsupported geotransform for tile '{tile_id}' and source '{source_id}': {message}")]
    UnsupportedTransform {
        tile_id: String,
        source_id: String,
        message: String,
    },

    #[error("invalid source id {source_id:?} for tile '{tile_id}': it must be non-empty, unpadded and free of ',', '{{', '}}' and line breaks")]
    InvalidSourceId { tile_id: String, source_id: String },

    #[error("storage error for tile '{tile_id}': {source}")]
    Storage {
        tile_id: String,
        #[source]
        source: StorageError,
    },
}

impl CompositeError {
    /// Whether the caller may retry the whole scene later.
    ///
    /// Only storage I/O failures are transient; data mismatches and corrupt
    /// tile files fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompositeError::Storage {
                source: StorageError::Io(_) | StorageError::Backend(_),
                ..
            }
        )
    }

    /// Tile the error refers to.
    pub fn tile_id(&self) -> &str {
        match self {
            CompositeError::TypeMismatch { tile_id, .. }
            | CompositeError::ShapeMismatch { tile_id, .. }
            | CompositeError::ResolutionMismatch { tile_id, .. }
            | CompositeError::UnsupportedTransform { tile_id, .. }
            | CompositeError::InvalidSourceId { tile_id, .. }
            | CompositeError::Storage { tile_id, .. } => tile_id,
        }
    }

    pub(crate) fn storage(tile_id: &str) -> impl FnOnce(StorageError) -> Self + '_ {
        move |source| CompositeError::Storage {
            tile_id: tile_id.to_string(),
            source,
        }
    }
}

/// Result type for compositing operations.
pub type Result<T> = std::result::Result<T, CompositeError>;
