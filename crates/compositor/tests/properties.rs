//! Compositing invariants: idempotence, no-data monotonicity, tile
//! independence, boundary overlap and failure isolation.

use compositor::{
    CompositeError, CompositeMode, CompositeOutcome, CompositeRequest, CompositingConfig,
    SkipReason, TileCompositor,
};
use storage::{HeaderFields, MemoryTileStore, StoredTile, TileStorage};
use test_utils::{
    constant_raster, gradient_raster, mask_from_fn, raster_from_values, square_tile, two_tile_grid,
};
use tile_common::BoolGrid;
use tile_grid::{GridLattice, TileLayout};

fn layout(id: &str, min_x: f64, min_y: f64, size: f64) -> TileLayout {
    GridLattice::default()
        .layout_for(&square_tile(id, min_x, min_y, size))
        .unwrap()
}

fn compositor() -> TileCompositor<MemoryTileStore> {
    TileCompositor::new(MemoryTileStore::new(), CompositingConfig::default())
}

#[test]
fn test_idempotent_reingestion() {
    let compositor = compositor();
    let tile = layout("T", 0.0, 0.0, 300.0);
    let scene = gradient_raster((-60.0, 240.0), 6, 6, 2);
    let request = CompositeRequest::new(&scene, "LC08_IDEM", CompositeMode::OverwriteNoDataOnly);

    compositor.composite(&tile, &request).unwrap();
    let after_first = compositor.store().raw_bytes("T").unwrap().unwrap();

    let second = compositor.composite(&tile, &request).unwrap();
    assert_eq!(second, CompositeOutcome::Skipped(SkipReason::AlreadyIngested));
    assert_eq!(compositor.store().raw_bytes("T").unwrap().unwrap(), after_first);
}

#[test]
fn test_no_data_monotonicity() {
    let compositor = compositor();
    let tile = layout("T", 0.0, 0.0, 300.0);
    let mut previous: Option<Vec<u16>> = None;

    for step in 0..6u16 {
        // Each scene is shifted and carries a different checkerboard of valid pixels.
        let origin = (f64::from(step) * 30.0 - 60.0, 300.0 - f64::from(step % 3) * 30.0);
        let scene = constant_raster(origin, 8, 8, 100 + step, 0.0);
        let mask = mask_from_fn(8, 8, |c, r| (c + r + step as usize) % 3 != 0);
        let id = format!("S2A_{}", step);
        let request = CompositeRequest::new(&scene, &id, CompositeMode::OverwriteNoDataOnly)
            .with_mask(&mask);
        compositor.composite(&tile, &request).unwrap();

        let current = compositor
            .store()
            .read("T")
            .unwrap()
            .unwrap()
            .raster
            .band_values::<u16>(0)
            .unwrap();
        if let Some(prev) = &previous {
            for (before, after) in prev.iter().zip(&current) {
                if *before != 0 {
                    assert_eq!(before, after, "valid pixel changed at step {}", step);
                }
            }
        }
        previous = Some(current);
    }
}

#[test]
fn test_disjoint_tile_independence() {
    let grid = two_tile_grid(300.0);
    let lattice = GridLattice::default();
    let a = lattice.layout_for(grid.tile("A").unwrap()).unwrap();
    let b = lattice.layout_for(grid.tile("B").unwrap()).unwrap();
    let scene = gradient_raster((150.0, 240.0), 10, 5, 1);
    let request = CompositeRequest::new(&scene, "LE07_SPLIT", CompositeMode::OverwriteAll);

    let only_a = compositor();
    only_a.composite(&a, &request).unwrap();

    let b_then_a = compositor();
    b_then_a.composite(&b, &request).unwrap();
    b_then_a.composite(&a, &request).unwrap();

    let a_then_b = compositor();
    a_then_b.composite(&a, &request).unwrap();
    a_then_b.composite(&b, &request).unwrap();

    let expected = only_a.store().raw_bytes("A").unwrap().unwrap();
    assert_eq!(b_then_a.store().raw_bytes("A").unwrap().unwrap(), expected);
    assert_eq!(a_then_b.store().raw_bytes("A").unwrap().unwrap(), expected);
    assert!(only_a.store().raw_bytes("B").unwrap().is_none());
}

#[test]
fn test_boundary_overlap_updates_exactly_one_column() {
    let compositor = compositor();
    let tile = layout("E", 300.0, 0.0, 300.0);
    // Scene spans x 0..330: its last column is the tile's first column.
    let scene = constant_raster((0.0, 300.0), 11, 10, 7u8, 0.0);

    let outcome = compositor
        .composite(
            &tile,
            &CompositeRequest::new(&scene, "EDGE", CompositeMode::OverwriteAll),
        )
        .unwrap();
    assert_eq!(outcome, CompositeOutcome::Merged { changed_values: 10 });

    let values = compositor
        .store()
        .read("E")
        .unwrap()
        .unwrap()
        .raster
        .band_values::<u8>(0)
        .unwrap();
    for (i, v) in values.iter().enumerate() {
        let expected = if i % 10 == 0 { 7 } else { 0 };
        assert_eq!(*v, expected, "pixel {}", i);
    }
}

#[test]
fn test_boundary_overlap_updates_exactly_one_row() {
    let compositor = compositor();
    let tile = layout("N", 0.0, 0.0, 300.0);
    // Scene spans y -270..30: its first row is the tile's last row.
    let scene = constant_raster((0.0, 30.0), 10, 10, 3u8, 0.0);

    let outcome = compositor
        .composite(
            &tile,
            &CompositeRequest::new(&scene, "ROW", CompositeMode::OverwriteAll),
        )
        .unwrap();
    assert_eq!(outcome, CompositeOutcome::Merged { changed_values: 10 });

    let values = compositor
        .store()
        .read("N")
        .unwrap()
        .unwrap()
        .raster
        .band_values::<u8>(0)
        .unwrap();
    assert!(values[..90].iter().all(|v| *v == 0));
    assert!(values[90..].iter().all(|v| *v == 3));
}

#[test]
fn test_type_mismatch_leaves_tile_untouched() {
    let store = MemoryTileStore::new();
    let existing = raster_from_values((0.0, 60.0), 2, 2, 0.0, vec![vec![0u8, 1, 0, 1]]);
    store
        .write("A1", &StoredTile::new(existing, HeaderFields::new()))
        .unwrap();
    let before = store.raw_bytes("A1").unwrap();
    let compositor = TileCompositor::new(store, CompositingConfig::default());

    let scene = raster_from_values((0.0, 60.0), 2, 2, -9999.0, vec![vec![5i16; 4]]);
    let err = compositor
        .composite(
            &layout("A1", 0.0, 0.0, 60.0),
            &CompositeRequest::new(&scene, "LC08_T", CompositeMode::OverwriteAll),
        )
        .unwrap_err();

    assert!(matches!(err, CompositeError::TypeMismatch { .. }));
    assert!(!err.is_retryable());
    assert_eq!(compositor.store().raw_bytes("A1").unwrap(), before);
    assert_eq!(compositor.store().write_count(), 1);
}

#[test]
fn test_mask_shape_mismatch() {
    let compositor = compositor();
    let scene = constant_raster((0.0, 60.0), 2, 2, 1u8, 0.0);
    let mask = BoolGrid::filled(3, 2, true);
    let err = compositor
        .composite(
            &layout("A1", 0.0, 0.0, 60.0),
            &CompositeRequest::new(&scene, "MASK", CompositeMode::OverwriteAll).with_mask(&mask),
        )
        .unwrap_err();

    match err {
        CompositeError::ShapeMismatch {
            tile_id,
            source_id,
            found,
            ..
        } => {
            assert_eq!(tile_id, "A1");
            assert_eq!(source_id, "MASK");
            assert_eq!(found, "mask 3x2");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(compositor.store().read("A1").unwrap().is_none());
}

#[test]
fn test_source_id_that_splits_provenance_is_rejected() {
    let compositor = compositor();
    let tile = layout("A1", 0.0, 0.0, 60.0);
    let scene = constant_raster((0.0, 60.0), 2, 2, 1u8, 0.0);

    for bad_id in ["a,b", "", " LC08_PAD", "{x}", "a\nb"] {
        let err = compositor
            .composite(&tile, &CompositeRequest::new(&scene, bad_id, CompositeMode::OverwriteAll))
            .unwrap_err();
        match &err {
            CompositeError::InvalidSourceId { tile_id, source_id } => {
                assert_eq!(tile_id, "A1");
                assert_eq!(source_id, bad_id);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!err.is_retryable());
    }
    assert_eq!(compositor.store().write_count(), 0);

    // A clean id still composites once and is then skipped.
    let request = CompositeRequest::new(&scene, "a_b", CompositeMode::OverwriteAll);
    assert_eq!(
        compositor.composite(&tile, &request).unwrap(),
        CompositeOutcome::Merged { changed_values: 4 }
    );
    assert_eq!(
        compositor.composite(&tile, &request).unwrap(),
        CompositeOutcome::Skipped(SkipReason::AlreadyIngested)
    );
}

#[test]
fn test_band_count_mismatch() {
    let compositor = compositor();
    let tile = layout("A1", 0.0, 0.0, 60.0);
    let one_band = gradient_raster((0.0, 60.0), 2, 2, 1);
    let two_bands = gradient_raster((0.0, 60.0), 2, 2, 2);

    compositor
        .composite(&tile, &CompositeRequest::new(&one_band, "ONE", CompositeMode::OverwriteAll))
        .unwrap();
    let err = compositor
        .composite(&tile, &CompositeRequest::new(&two_bands, "TWO", CompositeMode::OverwriteAll))
        .unwrap_err();
    assert!(matches!(err, CompositeError::ShapeMismatch { .. }));
}

#[test]
fn test_resolution_mismatch_is_scene_level_failure() {
    let compositor = compositor();
    let gt = tile_common::GeoTransform::north_up(0.0, 60.0, 15.0, -15.0).unwrap();
    let fine = tile_common::RasterDataset::from_bands(4, 4, gt, 0.0, vec![vec![1u8; 16]]).unwrap();
    let err = compositor
        .composite(
            &layout("A1", 0.0, 0.0, 60.0),
            &CompositeRequest::new(&fine, "FINE", CompositeMode::OverwriteAll),
        )
        .unwrap_err();
    assert!(matches!(err, CompositeError::ResolutionMismatch { .. }));
    assert!(!err.is_retryable());
}

#[test]
fn test_no_change_records_provenance_on_existing_tile() {
    let compositor = compositor();
    let tile = layout("A1", 0.0, 0.0, 60.0);
    let scene = constant_raster((0.0, 60.0), 2, 2, 4u8, 0.0);
    compositor
        .composite(&tile, &CompositeRequest::new(&scene, "FIRST", CompositeMode::OverwriteAll))
        .unwrap();
    let pixels = compositor.store().read("A1").unwrap().unwrap().raster;

    let nothing_valid = BoolGrid::filled(2, 2, false);
    let outcome = compositor
        .composite(
            &tile,
            &CompositeRequest::new(&scene, "CLOUDY", CompositeMode::OverwriteAll)
                .with_mask(&nothing_valid),
        )
        .unwrap();
    assert_eq!(outcome, CompositeOutcome::NoChange { recorded: true });

    let stored = compositor.store().read("A1").unwrap().unwrap();
    assert_eq!(stored.raster, pixels);
    assert!(stored.provenance().contains("CLOUDY"));
    assert!(stored.provenance().contains("FIRST"));

    // Recorded sources are skipped from then on.
    let again = compositor
        .composite(&tile, &CompositeRequest::new(&scene, "CLOUDY", CompositeMode::OverwriteAll))
        .unwrap();
    assert_eq!(again, CompositeOutcome::Skipped(SkipReason::AlreadyIngested));
}

#[test]
fn test_no_change_without_recording() {
    let config = CompositingConfig {
        record_no_change: false,
        ..Default::default()
    };
    let compositor = TileCompositor::new(MemoryTileStore::new(), config);
    let tile = layout("A1", 0.0, 0.0, 60.0);
    let scene = constant_raster((0.0, 60.0), 2, 2, 4u8, 0.0);
    compositor
        .composite(&tile, &CompositeRequest::new(&scene, "FIRST", CompositeMode::OverwriteAll))
        .unwrap();

    // Same values again under a new id: nothing changes.
    let outcome = compositor
        .composite(&tile, &CompositeRequest::new(&scene, "SAME", CompositeMode::OverwriteAll))
        .unwrap();
    assert_eq!(outcome, CompositeOutcome::NoChange { recorded: false });
    assert_eq!(compositor.store().write_count(), 1);
    assert!(!compositor
        .store()
        .read("A1")
        .unwrap()
        .unwrap()
        .provenance()
        .contains("SAME"));
}

#[test]
fn test_no_change_never_creates_tile() {
    let compositor = compositor();
    let scene = constant_raster((0.0, 60.0), 2, 2, 4u8, 0.0);
    let nothing_valid = BoolGrid::filled(2, 2, false);
    let outcome = compositor
        .composite(
            &layout("A1", 0.0, 0.0, 60.0),
            &CompositeRequest::new(&scene, "CLOUDY", CompositeMode::OverwriteNoDataOnly)
                .with_mask(&nothing_valid),
        )
        .unwrap();
    assert_eq!(outcome, CompositeOutcome::NoChange { recorded: false });
    assert!(compositor.store().read("A1").unwrap().is_none());
}

#[test]
fn test_nan_nodata_float_tile() {
    let compositor = compositor();
    let tile = layout("F", 0.0, 0.0, 60.0);
    let first = raster_from_values((0.0, 60.0), 2, 2, f64::NAN, vec![vec![f32::NAN, 1.5, f32::NAN, f32::NAN]]);
    let second = raster_from_values((0.0, 60.0), 2, 2, f64::NAN, vec![vec![9.0f32, 9.0, f32::NAN, 2.0]]);

    compositor
        .composite(&tile, &CompositeRequest::new(&first, "F1", CompositeMode::OverwriteNoDataOnly))
        .unwrap();
    let outcome = compositor
        .composite(&tile, &CompositeRequest::new(&second, "F2", CompositeMode::OverwriteNoDataOnly))
        .unwrap();
    assert_eq!(outcome, CompositeOutcome::Merged { changed_values: 2 });

    let values = compositor
        .store()
        .read("F")
        .unwrap()
        .unwrap()
        .raster
        .band_values::<f32>(0)
        .unwrap();
    assert_eq!(values[0], 9.0);
    assert_eq!(values[1], 1.5);
    assert!(values[2].is_nan());
    assert_eq!(values[3], 2.0);
}
