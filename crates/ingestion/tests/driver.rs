//! Driver behaviour across several tiles, stores and catalogs.

use std::sync::Arc;

use compositor::{CompositeMode, CompositingConfig};
use ingestion::{IngestionDriver, IngestionError, IngestionRequest, TileLocks, TileStatus};
use storage::{
    HeaderFields, JsonLinesCatalog, MemoryTileStore, StoredTile, TileStorage,
};
use test_utils::{assert_bands_eq, constant_raster, raster_from_values, temp_dir, two_tile_grid};
use tile_grid::{GridLattice, TileGrid};

/// Tiles A (0..60) and B (60..120), each 2x2 pixels.
fn driver(config: CompositingConfig) -> IngestionDriver<MemoryTileStore> {
    IngestionDriver::new(
        two_tile_grid(60.0),
        GridLattice::default(),
        MemoryTileStore::new(),
        config,
    )
}

/// 4x2 scene covering both tiles.
fn wide_scene() -> IngestionRequest {
    let source = raster_from_values((0.0, 60.0), 4, 2, 0.0, vec![vec![1u8, 2, 3, 4, 5, 6, 7, 8]]);
    IngestionRequest::new(source, "scene-1").with_mode(CompositeMode::OverwriteAll)
}

fn band(store: &MemoryTileStore, tile_id: &str) -> Vec<u8> {
    store.read(tile_id).unwrap().unwrap().raster.bands()[0].clone()
}

#[test]
fn test_scene_split_across_tiles() {
    let driver = driver(CompositingConfig::default());
    let report = driver.ingest(&wide_scene()).unwrap();

    let ids: Vec<&str> = report.results.iter().map(|r| r.tile_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(report.merged_tiles(), vec!["A".to_string(), "B".to_string()]);
    assert_eq!(report.result("A").unwrap().changed_values, 4);

    assert_eq!(band(driver.store(), "A"), vec![1, 2, 5, 6]);
    assert_eq!(band(driver.store(), "B"), vec![3, 4, 7, 8]);
}

#[test]
fn test_reingest_is_skipped_and_idempotent() {
    let driver = driver(CompositingConfig::default());
    driver.ingest(&wide_scene()).unwrap();
    let before = driver.store().raw_bytes("A").unwrap();

    let report = driver.ingest(&wide_scene()).unwrap();
    assert_eq!(report.count(TileStatus::Skipped), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.skip_reason.as_deref() == Some("already ingested")));
    assert_eq!(driver.store().raw_bytes("A").unwrap(), before);
}

#[test]
fn test_touching_tile_is_skipped_for_no_overlap() {
    let driver = driver(CompositingConfig::default());
    let source = constant_raster((0.0, 60.0), 2, 2, 9u8, 0.0);
    let report = driver.ingest(&IngestionRequest::new(source, "scene-a")).unwrap();

    assert_eq!(report.result("A").unwrap().status, TileStatus::Merged);
    let b = report.result("B").unwrap();
    assert_eq!(b.status, TileStatus::Skipped);
    assert_eq!(b.skip_reason.as_deref(), Some("no overlap"));
    assert!(!driver.store().exists("B").unwrap());
}

#[test]
fn test_scene_outside_grid() {
    let driver = driver(CompositingConfig::default());
    let source = constant_raster((9000.0, 9000.0), 2, 2, 9u8, 0.0);
    let report = driver.ingest(&IngestionRequest::new(source, "far-away")).unwrap();
    assert!(report.results.is_empty());
    assert!(driver.store().tile_ids().unwrap().is_empty());
}

#[test]
fn test_failed_tile_does_not_stop_others() {
    let driver = driver(CompositingConfig::default());
    let int16_tile = raster_from_values((0.0, 60.0), 2, 2, -1.0, vec![vec![-1i16; 4]]);
    driver
        .store()
        .write("A", &StoredTile::new(int16_tile, HeaderFields::new()))
        .unwrap();
    let before = driver.store().raw_bytes("A").unwrap();

    let report = driver.ingest(&wide_scene()).unwrap();
    let a = report.result("A").unwrap();
    assert_eq!(a.status, TileStatus::Failed);
    assert!(!a.retryable);
    assert!(a.error.as_deref().unwrap().contains("scene-1"));
    assert_eq!(report.result("B").unwrap().status, TileStatus::Merged);
    assert!(report.has_failures());
    assert_eq!(driver.store().raw_bytes("A").unwrap(), before);
}

#[test]
fn test_invalid_request_is_rejected() {
    let driver = driver(CompositingConfig::default());
    let source = constant_raster((0.0, 60.0), 2, 2, 9u8, 0.0);
    let result = driver.ingest(&IngestionRequest::new(source, "bad,id"));
    assert!(matches!(result, Err(IngestionError::InvalidRequest(_))));
    assert!(driver.store().tile_ids().unwrap().is_empty());
}

#[test]
fn test_source_nodata_mask() {
    let config = CompositingConfig {
        mask_source_nodata: true,
        ..CompositingConfig::default()
    };
    let driver = driver(config);
    let existing = constant_raster((0.0, 60.0), 2, 2, 9u8, 0.0);
    driver
        .store()
        .write("A", &StoredTile::new(existing, HeaderFields::new()))
        .unwrap();

    let source = raster_from_values((0.0, 60.0), 2, 2, 0.0, vec![vec![1u8, 0, 0, 4]]);
    let request = IngestionRequest::new(source, "scene-m").with_mode(CompositeMode::OverwriteAll);
    let report = driver.ingest(&request).unwrap();

    assert_eq!(report.result("A").unwrap().changed_values, 2);
    assert_eq!(band(driver.store(), "A"), vec![1, 9, 9, 4]);
}

#[test]
fn test_catalog_notified_once_per_effective_scene() {
    let dir = temp_dir();
    let catalog = Arc::new(JsonLinesCatalog::new(dir.path().join("catalog.jsonl")));
    let driver = driver(CompositingConfig::default()).with_catalog(catalog.clone());

    driver.ingest(&wide_scene()).unwrap();
    driver.ingest(&wide_scene()).unwrap();

    let entries = catalog.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].source_id, "scene-1");
    assert_eq!(entries[0].merged_tiles, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn test_disjoint_tile_independence() {
    let full = driver(CompositingConfig::default());
    full.ingest(&wide_scene()).unwrap();

    let only_a = IngestionDriver::new(
        TileGrid::new(vec![test_utils::square_tile("A", 0.0, 0.0, 60.0)]).unwrap(),
        GridLattice::default(),
        MemoryTileStore::new(),
        CompositingConfig::default(),
    );
    only_a.ingest(&wide_scene()).unwrap();

    let a_full = full.store().read("A").unwrap().unwrap();
    let a_alone = only_a.store().read("A").unwrap().unwrap();
    assert_bands_eq!(a_full.raster, a_alone.raster);
    assert_eq!(a_full.provenance(), a_alone.provenance());
}

#[test]
fn test_parallel_scenes_share_tile_locks() {
    let locks = Arc::new(TileLocks::new());
    let driver = driver(CompositingConfig::default()).with_locks(locks.clone());

    let scenes: Vec<IngestionRequest> = (0..4u8)
        .map(|i| {
            let source = constant_raster((0.0, 60.0), 4, 2, i + 1, 0.0);
            IngestionRequest::new(source, format!("scene-{}", i))
        })
        .collect();

    std::thread::scope(|scope| {
        for scene in &scenes {
            let driver = &driver;
            scope.spawn(move || driver.ingest(scene).unwrap());
        }
    });

    for tile_id in ["A", "B"] {
        let tile = driver.store().read(tile_id).unwrap().unwrap();
        assert_eq!(tile.provenance().len(), 4, "tile {}", tile_id);
        // Whichever scene arrived first filled every pixel of the tile.
        let values = tile.raster.band_values::<u8>(0).unwrap();
        assert!(values.iter().all(|&v| v == values[0]));
    }
    assert_eq!(locks.len(), 2);
}
