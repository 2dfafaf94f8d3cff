//! Scene ingestion across every intersected tile.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use compositor::{CompositeRequest, CompositingConfig, TileCompositor};
use storage::{CatalogEntry, CatalogSink, FsTileStore, JsonLinesCatalog, NullCatalog, TileStorage};
use tile_common::BoolGrid;
use tile_grid::{GridLattice, TileGrid, TileLayout};

use crate::config::IngestionConfig;
use crate::error::Result;
use crate::locks::TileLocks;
use crate::report::{IngestionReport, PerTileResult, TileStatus};
use crate::request::IngestionRequest;

/// Resolves the tiles a scene touches and composites it into each of them.
///
/// Tiles are processed one after another in tile id order. A failing tile
/// is reported and the remaining tiles are still processed.
pub struct IngestionDriver<S: TileStorage> {
    grid: TileGrid,
    lattice: GridLattice,
    compositor: TileCompositor<S>,
    catalog: Arc<dyn CatalogSink>,
    locks: Option<Arc<TileLocks>>,
}

impl IngestionDriver<FsTileStore> {
    /// Driver over the grid, tile directory and catalog named in `config`.
    pub fn from_config(config: &IngestionConfig) -> Result<Self> {
        let grid = TileGrid::from_geojson_path(&config.tile_grid.path, &config.tile_grid.id_property)?;
        let store = FsTileStore::open(&config.storage.tile_dir)?;

        let catalog: Arc<dyn CatalogSink> = match &config.storage.catalog_path {
            Some(path) => Arc::new(JsonLinesCatalog::new(path)),
            None => Arc::new(NullCatalog),
        };

        info!(
            tiles = grid.len(),
            tile_dir = %config.storage.tile_dir.display(),
            pixel_size = config.tile_grid.pixel_size,
            "Ingestion driver ready"
        );
        Ok(Self::new(grid, config.lattice(), store, config.compositing.clone()).with_catalog(catalog))
    }
}

impl<S: TileStorage> IngestionDriver<S> {
    pub fn new(grid: TileGrid, lattice: GridLattice, store: S, config: CompositingConfig) -> Self {
        Self {
            grid,
            lattice,
            compositor: TileCompositor::new(store, config),
            catalog: Arc::new(NullCatalog),
            locks: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogSink>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Serialize tile access through `locks`, shared with other drivers or
    /// threads ingesting concurrently into the same store.
    pub fn with_locks(mut self, locks: Arc<TileLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn store(&self) -> &S {
        self.compositor.store()
    }

    pub fn config(&self) -> &CompositingConfig {
        self.compositor.config()
    }

    /// Ingest one scene into every tile it intersects.
    ///
    /// Returns an error only when the request itself is invalid; per-tile
    /// failures are reported as [`TileStatus::Failed`].
    #[instrument(skip_all, fields(source_id = %request.source_id, mode = %request.mode))]
    pub fn ingest(&self, request: &IngestionRequest) -> Result<IngestionReport> {
        request.validate()?;

        let derived_mask = (request.mask.is_none() && self.config().mask_source_nodata)
            .then(|| BoolGrid::from_nodata(&request.source));
        if let Some(mask) = &derived_mask {
            debug!(valid = mask.count_valid(), "Derived validity mask from source no-data");
        }
        let composite = request.as_composite(derived_mask.as_ref());

        let tiles = self.grid.tiles_intersecting_footprint(&request.footprint());
        if tiles.is_empty() {
            info!("Scene intersects no tiles");
        }

        let mut report = IngestionReport::new(&request.source_id);
        for tile in tiles {
            let result = match self.lattice.layout_for(tile) {
                Ok(layout) => self.composite_tile(&layout, &composite),
                Err(e) => {
                    warn!(tile_id = %tile.id(), error = %e, "Cannot lay out tile");
                    PerTileResult::failed(tile.id(), e.to_string())
                }
            };
            report.push(result);
        }

        self.notify_catalog(&report);

        info!(
            tiles = report.results.len(),
            merged = report.count(TileStatus::Merged),
            no_change = report.count(TileStatus::NoChange),
            skipped = report.count(TileStatus::Skipped),
            failed = report.count(TileStatus::Failed),
            "Scene ingested"
        );
        Ok(report)
    }

    fn composite_tile(&self, layout: &TileLayout, request: &CompositeRequest<'_>) -> PerTileResult {
        let run = || self.compositor.composite(layout, request);
        let outcome = match &self.locks {
            Some(locks) => locks.with_lock(&layout.tile_id, run),
            None => run(),
        };

        match outcome {
            Ok(outcome) => PerTileResult::from_outcome(&layout.tile_id, outcome),
            Err(e) => {
                warn!(
                    tile_id = %layout.tile_id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Tile compositing failed"
                );
                PerTileResult::from_error(&layout.tile_id, &e)
            }
        }
    }

    fn notify_catalog(&self, report: &IngestionReport) {
        let entry = CatalogEntry::new(
            report.source_id.clone(),
            report.merged_tiles(),
            report.recorded_tiles(),
        );
        if entry.is_empty() {
            return;
        }
        if let Err(e) = self.catalog.notify(&entry) {
            warn!(source_id = %report.source_id, error = %e, "Catalog notification failed");
        }
    }
}
