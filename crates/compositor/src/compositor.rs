//! Per (scene, tile) compositing state machine.
//!
//! ```text
//! Start ──invalid source id───────► InvalidSourceId error
//!   │   ──no overlap──────────────► Skipped(NoOverlap)
//!   │   ──source in provenance────► Skipped(AlreadyIngested)
//!   ▼
//! Load (existing tile, or all no-data tile shaped like the source)
//!   ▼
//! Merge (pure, per band)
//!   ├──changed > 0──► Persist (pixels + provenance in one write) ──► Merged
//!   └──changed = 0──► NoChange (provenance recorded on existing tiles only)
//! ```

use tracing::{debug, info, instrument};

use storage::{HeaderFields, ProvenanceLedger, ProvenanceRecord, StoredTile, TileStorage};
use tile_common::{BoolGrid, GeoTransform, RasterDataset, Sensor};
use tile_grid::TileLayout;

use crate::clip::{ClipError, FootprintClipper};
use crate::config::CompositingConfig;
use crate::error::{CompositeError, Result};
use crate::merge::{merge_bands, CompositeMode, MergePlan};

/// A scene to merge, borrowed for the duration of one composite call.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRequest<'a> {
    pub source: &'a RasterDataset,
    pub source_id: &'a str,
    /// Per-pixel validity over the source; `None` means all valid.
    pub mask: Option<&'a BoolGrid>,
    pub mode: CompositeMode,
    /// Sensor tag written into newly created tiles.
    pub sensor: Option<Sensor>,
}

impl<'a> CompositeRequest<'a> {
    pub fn new(source: &'a RasterDataset, source_id: &'a str, mode: CompositeMode) -> Self {
        Self {
            source,
            source_id,
            mask: None,
            mode,
            sensor: None,
        }
    }

    pub fn with_mask(mut self, mask: &'a BoolGrid) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = Some(sensor);
        self
    }
}

/// Why a tile was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The scene footprint does not overlap the tile.
    NoOverlap,
    /// The source is already listed in the tile's provenance.
    AlreadyIngested,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoOverlap => "no overlap",
            SkipReason::AlreadyIngested => "already ingested",
        }
    }
}

/// Terminal state of one composite call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOutcome {
    Skipped(SkipReason),
    /// Pixels changed and the tile was written.
    Merged { changed_values: usize },
    /// No pixel changed; `recorded` tells whether provenance was updated.
    NoChange { recorded: bool },
}

/// Merges scenes into tile rasters held by a [`TileStorage`].
///
/// Assumes a single writer per tile; callers running scenes in parallel
/// must serialize access to each tile.
pub struct TileCompositor<S> {
    store: S,
    config: CompositingConfig,
    clipper: FootprintClipper,
}

impl<S: TileStorage> TileCompositor<S> {
    pub fn new(store: S, config: CompositingConfig) -> Self {
        let clipper = FootprintClipper::new(config.resolution_tolerance);
        Self {
            store,
            config,
            clipper,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CompositingConfig {
        &self.config
    }

    /// Merge one scene into one tile.
    ///
    /// The tile is written at most once, after the merge is fully computed
    /// in memory; every error leaves it untouched.
    #[instrument(skip_all, fields(tile_id = %layout.tile_id, source_id = %request.source_id, mode = %request.mode))]
    pub fn composite(
        &self,
        layout: &TileLayout,
        request: &CompositeRequest<'_>,
    ) -> Result<CompositeOutcome> {
        let tile_id = layout.tile_id.as_str();
        let source = request.source;

        if !ProvenanceRecord::is_valid_source_id(request.source_id) {
            return Err(CompositeError::InvalidSourceId {
                tile_id: tile_id.to_string(),
                source_id: request.source_id.to_string(),
            });
        }

        let windows = match self.clipper.clip(layout, source) {
            Ok(Some(windows)) => windows,
            Ok(None) => {
                debug!("Scene does not overlap tile");
                return Ok(CompositeOutcome::Skipped(SkipReason::NoOverlap));
            }
            Err(err) => return Err(self.clip_error(layout, request, err)),
        };

        let ledger = ProvenanceLedger::new(&self.store);
        if ledger
            .contains(tile_id, request.source_id)
            .map_err(CompositeError::storage(tile_id))?
        {
            debug!("Source already in tile provenance");
            return Ok(CompositeOutcome::Skipped(SkipReason::AlreadyIngested));
        }

        if let Some(mask) = request.mask {
            if (mask.width(), mask.height()) != (source.width(), source.height()) {
                return Err(self.shape_error(
                    layout,
                    request,
                    format!("mask {}x{}", source.width(), source.height()),
                    format!("mask {}x{}", mask.width(), mask.height()),
                ));
            }
        }

        let (tile, existed) = self.load(layout, request)?;
        let dest = &tile.raster;

        if dest.data_type() != source.data_type() {
            return Err(CompositeError::TypeMismatch {
                tile_id: tile_id.to_string(),
                source_id: request.source_id.to_string(),
                expected: dest.data_type(),
                found: source.data_type(),
            });
        }
        if dest.band_count() != source.band_count() {
            return Err(self.shape_error(
                layout,
                request,
                format!("{} band(s)", dest.band_count()),
                format!("{} band(s)", source.band_count()),
            ));
        }

        let dest_nodata = dest.nodata_matcher();
        let plan = MergePlan {
            windows,
            dest_width: dest.width(),
            src_width: source.width(),
            element_size: dest.data_type().size_bytes(),
            mode: request.mode,
            dest_nodata: &dest_nodata,
            mask: request.mask,
        };
        let (bands, changed_values) = merge_bands(dest.bands(), source.bands(), &plan);

        let mut sources = tile.provenance();
        sources.insert(request.source_id);

        if changed_values == 0 {
            let recorded = existed && self.config.record_no_change;
            if recorded {
                let updated = StoredTile::new(tile.raster, tile.header.with_sources(&sources));
                self.store
                    .write(tile_id, &updated)
                    .map_err(CompositeError::storage(tile_id))?;
            }
            info!(recorded, "Scene contributed no pixels");
            return Ok(CompositeOutcome::NoChange { recorded });
        }

        let raster = tile.raster.with_bands(bands).map_err(|e| {
            self.shape_error(layout, request, "merged bands".to_string(), e.to_string())
        })?;
        let updated = StoredTile::new(raster, tile.header.with_sources(&sources));
        self.store
            .write(tile_id, &updated)
            .map_err(CompositeError::storage(tile_id))?;

        info!(
            changed_values,
            window_pixels = windows.pixel_count(),
            created = !existed,
            "Merged scene into tile"
        );
        Ok(CompositeOutcome::Merged { changed_values })
    }

    /// Existing tile, or an all no-data tile shaped like the source.
    fn load(
        &self,
        layout: &TileLayout,
        request: &CompositeRequest<'_>,
    ) -> Result<(StoredTile, bool)> {
        let tile_id = layout.tile_id.as_str();
        let existing = self
            .store
            .read(tile_id)
            .map_err(CompositeError::storage(tile_id))?;

        if let Some(tile) = existing {
            let raster = &tile.raster;
            let frame_matches = (raster.width(), raster.height()) == (layout.width, layout.height)
                && same_frame(raster.geotransform(), &layout.geotransform);
            if !frame_matches {
                return Err(self.shape_error(
                    layout,
                    request,
                    format!(
                        "tile raster {}x{} at {:?}",
                        layout.width,
                        layout.height,
                        layout.geotransform.origin()
                    ),
                    format!(
                        "stored raster {}x{} at {:?}",
                        raster.width(),
                        raster.height(),
                        raster.geotransform().origin()
                    ),
                ));
            }
            return Ok((tile, true));
        }

        let source = request.source;
        let raster = RasterDataset::filled_with_nodata(
            layout.width,
            layout.height,
            source.band_count(),
            source.data_type(),
            layout.geotransform,
            source.nodata(),
        )
        .map_err(|e| self.shape_error(layout, request, "tile raster".to_string(), e.to_string()))?;

        let header = match request.sensor {
            Some(sensor) => HeaderFields::new().with_sensor(sensor),
            None => HeaderFields::new(),
        };
        debug!(width = layout.width, height = layout.height, "Synthesized empty tile");
        Ok((StoredTile::new(raster, header), false))
    }

    fn clip_error(
        &self,
        layout: &TileLayout,
        request: &CompositeRequest<'_>,
        err: ClipError,
    ) -> CompositeError {
        match err {
            ClipError::ResolutionMismatch { tile, source } => CompositeError::ResolutionMismatch {
                tile_id: layout.tile_id.clone(),
                source_id: request.source_id.to_string(),
                tile,
                found: source,
            },
            ClipError::UnsupportedTransform(message) => CompositeError::UnsupportedTransform {
                tile_id: layout.tile_id.clone(),
                source_id: request.source_id.to_string(),
                message,
            },
        }
    }

    fn shape_error(
        &self,
        layout: &TileLayout,
        request: &CompositeRequest<'_>,
        expected: String,
        found: String,
    ) -> CompositeError {
        CompositeError::ShapeMismatch {
            tile_id: layout.tile_id.clone(),
            source_id: request.source_id.to_string(),
            expected,
            found,
        }
    }
}

/// Same coefficients up to a millionth of a pixel.
fn same_frame(a: &GeoTransform, b: &GeoTransform) -> bool {
    let tolerance = 1e-6 * a.pixel_size().0.abs();
    a.coefficients()
        .iter()
        .zip(b.coefficients().iter())
        .all(|(x, y)| (x - y).abs() <= tolerance)
}
