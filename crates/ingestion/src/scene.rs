//! Loading scene files from disk.
//!
//! Scenes use the tile file format. The header may carry a `source id` and
//! a `sensor`; a `<scene>.mask` file next to the scene, if present, is a
//! single band uint8 raster where non-zero marks valid pixels.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use storage::codec::decode_tile;
use storage::header::KEY_SOURCE_ID;
use tile_common::{BoolGrid, DataType, Sensor};

use crate::error::{IngestionError, Result};
use crate::request::IngestionRequest;

/// Extension of the validity mask companion file.
pub const MASK_EXTENSION: &str = "mask";

/// Path of the mask companion for `scene_path`.
pub fn mask_path(scene_path: &Path) -> PathBuf {
    scene_path.with_extension(MASK_EXTENSION)
}

/// Read a scene file and its optional mask into a request.
///
/// The request uses the default compositing mode; callers override it.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_scene(path: impl AsRef<Path>) -> Result<IngestionRequest> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(storage::StorageError::from)?;
    let scene = decode_tile(&bytes)?;

    let source_id = match scene.header.get(KEY_SOURCE_ID) {
        Some(id) => id.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                IngestionError::InvalidRequest(format!(
                    "cannot derive a source id from {}",
                    path.display()
                ))
            })?,
    };
    let sensor = scene
        .header
        .sensor()?
        .or_else(|| Sensor::from_scene_id(&source_id));

    let mut request = IngestionRequest::new(scene.raster, source_id);
    if let Some(sensor) = sensor {
        request = request.with_sensor(sensor);
    }

    let mask_file = mask_path(path);
    if mask_file.is_file() {
        request = request.with_mask(load_mask(&mask_file)?);
    }

    debug!(
        source_id = %request.source_id,
        width = request.source.width(),
        height = request.source.height(),
        bands = request.source.band_count(),
        masked = request.mask.is_some(),
        "Loaded scene"
    );
    Ok(request)
}

/// Read a validity mask file.
pub fn load_mask(path: impl AsRef<Path>) -> Result<BoolGrid> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(storage::StorageError::from)?;
    let raster = decode_tile(&bytes)?.raster;

    if raster.data_type() != DataType::UInt8 || raster.band_count() != 1 {
        return Err(IngestionError::InvalidRequest(format!(
            "mask {} must be a single uint8 band, found {} band(s) of {}",
            path.display(),
            raster.band_count(),
            raster.data_type()
        )));
    }

    let cells = raster.bands()[0].iter().map(|&v| v != 0).collect();
    Ok(BoolGrid::new(raster.width(), raster.height(), cells)?)
}
