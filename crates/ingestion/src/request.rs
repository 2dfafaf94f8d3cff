//! A single scene offered for ingestion.

use compositor::{CompositeMode, CompositeRequest};
use storage::ProvenanceRecord;
use tile_common::{BoolGrid, RasterDataset, Sensor};

use crate::error::{IngestionError, Result};

/// One source scene with its identifier, optional validity mask and mode.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub source: RasterDataset,
    /// Unique per acquisition; recorded in tile provenance.
    pub source_id: String,
    /// Same shape as `source`; absent means every pixel is valid.
    pub mask: Option<BoolGrid>,
    pub mode: CompositeMode,
    pub sensor: Option<Sensor>,
}

impl IngestionRequest {
    pub fn new(source: RasterDataset, source_id: impl Into<String>) -> Self {
        Self {
            source,
            source_id: source_id.into(),
            mask: None,
            mode: CompositeMode::default(),
            sensor: None,
        }
    }

    pub fn with_mask(mut self, mask: BoolGrid) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_mode(mut self, mode: CompositeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Check scene-level preconditions.
    ///
    /// The source id must survive storage in a provenance list, and a scene
    /// tagged with a sensor must match that sensor's band count and type.
    pub fn validate(&self) -> Result<()> {
        if !ProvenanceRecord::is_valid_source_id(&self.source_id) {
            return Err(IngestionError::InvalidRequest(format!(
                "source id {:?} must be non-empty with no surrounding whitespace and no ',', '{{', '}}' and line breaks",
                self.source_id
            )));
        }

        if let Some(sensor) = self.sensor {
            let profile = sensor.profile();
            if self.source.band_count() != profile.band_count() {
                return Err(IngestionError::InvalidRequest(format!(
                    "{} scene {} has {} band(s), profile expects {}",
                    sensor,
                    self.source_id,
                    self.source.band_count(),
                    profile.band_count()
                )));
            }
            if self.source.data_type() != profile.data_type {
                return Err(IngestionError::InvalidRequest(format!(
                    "{} scene {} holds {}, profile expects {}",
                    sensor,
                    self.source_id,
                    self.source.data_type(),
                    profile.data_type
                )));
            }
        }

        Ok(())
    }

    /// Four corners of the scene footprint, clockwise from upper-left.
    pub fn footprint(&self) -> [(f64, f64); 4] {
        self.source
            .geotransform()
            .footprint(self.source.width(), self.source.height())
    }

    /// Borrowed view handed to the compositor, with `mask` overriding the
    /// request's own mask when given.
    pub(crate) fn as_composite<'a>(&'a self, mask: Option<&'a BoolGrid>) -> CompositeRequest<'a> {
        CompositeRequest {
            source: &self.source,
            source_id: &self.source_id,
            mask: mask.or(self.mask.as_ref()),
            mode: self.mode,
            sensor: self.sensor,
        }
    }
}
