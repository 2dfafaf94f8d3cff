//! Loading configuration, grid and scenes from disk and ingesting them.

use std::fs;

use ingestion::{load_scene, mask_path, IngestionConfig, IngestionDriver, TileStatus};
use storage::codec::encode_tile;
use storage::header::KEY_SOURCE_ID;
use storage::{HeaderFields, JsonLinesCatalog, StoredTile, TileStorage};
use test_utils::{raster_from_values, square_grid_geojson, temp_dir, write_file};

#[test]
fn test_ingest_scene_files_from_config() {
    let dir = temp_dir();
    let grid_path = write_file(
        dir.path(),
        "grid.geojson",
        &square_grid_geojson(&[("west", 0.0, 0.0, 60.0), ("east", 60.0, 0.0, 60.0)]),
    );
    let tile_dir = dir.path().join("tiles");
    let catalog_path = dir.path().join("catalog.jsonl");
    let config_path = write_file(
        dir.path(),
        "ingestion.yaml",
        &format!(
            "tile_grid:\n  path: {}\nstorage:\n  tile_dir: {}\n  catalog_path: {}\ncompositing:\n  default_mode: overwrite-all\n",
            grid_path.display(),
            tile_dir.display(),
            catalog_path.display()
        ),
    );

    let config = IngestionConfig::load(&config_path).unwrap();
    let driver = IngestionDriver::from_config(&config).unwrap();
    assert_eq!(driver.grid().len(), 2);

    let scene_path = dir.path().join("scene.tile");
    let scene = raster_from_values((30.0, 60.0), 2, 2, 0.0, vec![vec![10u8, 20, 30, 40]]);
    fs::write(
        &scene_path,
        encode_tile(&StoredTile::new(scene, HeaderFields::new().with_field(KEY_SOURCE_ID, "pass-17"))).unwrap(),
    )
    .unwrap();
    let mask = raster_from_values((30.0, 60.0), 2, 2, 0.0, vec![vec![1u8, 1, 0, 1]]);
    fs::write(
        mask_path(&scene_path),
        encode_tile(&StoredTile::new(mask, HeaderFields::new())).unwrap(),
    )
    .unwrap();

    let request = load_scene(&scene_path)
        .unwrap()
        .with_mode(config.compositing.default_mode);
    let report = driver.ingest(&request).unwrap();

    assert_eq!(report.source_id, "pass-17");
    assert_eq!(report.merged_tiles(), vec!["east".to_string(), "west".to_string()]);
    assert!(tile_dir.join("west.tile").is_file());

    // Scene column 0 lands in west column 1, scene column 1 in east column 0.
    let west = driver.store().read("west").unwrap().unwrap();
    assert_eq!(west.raster.bands()[0], vec![0, 10, 0, 0]);
    let east = driver.store().read("east").unwrap().unwrap();
    assert_eq!(east.raster.bands()[0], vec![20, 0, 40, 0]);
    assert!(east.provenance().contains("pass-17"));

    let entries = JsonLinesCatalog::new(&catalog_path).entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].merged_tiles.len(), 2);
    assert!(report.results.iter().all(|r| r.status == TileStatus::Merged));
}

#[test]
fn test_missing_grid_is_configuration_error() {
    let dir = temp_dir();
    let config_path = write_file(
        dir.path(),
        "ingestion.yaml",
        &format!(
            "tile_grid:\n  path: {}\nstorage:\n  tile_dir: {}\n",
            dir.path().join("absent.geojson").display(),
            dir.path().join("tiles").display()
        ),
    );
    let config = IngestionConfig::load(&config_path).unwrap();
    assert!(matches!(
        IngestionDriver::from_config(&config),
        Err(ingestion::IngestionError::Configuration(_))
    ));
}
