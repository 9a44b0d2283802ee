//! End-to-end tiling scenarios.
//!
//! Run with: cargo test -p mesh-tile --test scenarios

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp, clippy::cast_possible_truncation)]

use std::collections::BTreeMap;
use std::path::Path;

use mesh_repair::check_closed_manifold;
use mesh_tile::{
    BuiltTile, CellId, ConfigError, ConnectorConfig, ConnectorKind, Grid, HoleConfig, HoleSite, NormalizeConfig,
    TileError, TileWarning, TilingConfig, TilingEngine, tile_file_name,
};
use mesh_types::{IndexedMesh, Point3, Vertex, axis_box};

// =============================================================================
// Inputs
// =============================================================================

/// 1.0 m x 1.0 m flat city block, 20 mm thick.
fn flat_square() -> IndexedMesh {
    axis_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.02))
}

/// Two terraces extruded along Y over `[0, 1]`: 1 high over `x in [0, 1]`,
/// 2 high over `x in [1, 2]`.
fn terraces() -> IndexedMesh {
    let profile = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0), (0.0, 1.0)];
    let mut mesh = IndexedMesh::new();
    for y in [0.0, 1.0] {
        for &(x, z) in &profile {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
    }
    let n = profile.len() as u32;
    for i in 0..n {
        let (a, b) = ((4 + i + 1) % n, (4 + i + 2) % n);
        if a == 4 || b == 4 {
            continue;
        }
        mesh.faces.push([4, a, b]);
        mesh.faces.push([n + 4, n + b, n + a]);
    }
    for i in 0..n {
        let j = (i + 1) % n;
        mesh.faces.push([i, n + i, n + j]);
        mesh.faces.push([i, n + j, j]);
    }
    mesh
}

/// Block of height `h` over a simple counter-clockwise `outline`, its top
/// and bottom fanned from `apex`.
fn prism(outline: &[(f64, f64)], apex: usize, h: f64) -> IndexedMesh {
    let mut mesh = IndexedMesh::new();
    for z in [0.0, h] {
        for &(x, y) in outline {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
    }
    let n = outline.len();
    let (bottom, top) = (|i: usize| (i % n) as u32, |i: usize| (n + i % n) as u32);
    for k in 1..n - 1 {
        mesh.faces.push([top(apex), top(apex + k), top(apex + k + 1)]);
        mesh.faces.push([bottom(apex), bottom(apex + k + 1), bottom(apex + k)]);
    }
    for i in 0..n {
        mesh.faces.push([bottom(i), bottom(i + 1), top(i + 1)]);
        mesh.faces.push([bottom(i), top(i + 1), top(i)]);
    }
    mesh
}

/// Flat square whose top is split along the diagonal from (1, 0) to (0, 1).
fn diagonal_square() -> IndexedMesh {
    prism(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)], 1, 0.02)
}

/// Unit square without its north-east quarter.
fn l_block() -> IndexedMesh {
    prism(
        &[(0.0, 0.0), (1.0, 0.0), (1.0, 0.5), (0.5, 0.5), (0.5, 1.0), (0.0, 1.0)],
        3,
        0.02,
    )
}

/// Every butterfly half is built at the same scale as the one facing it.
fn assert_partners_agree(grid: &Grid, tiles: &[BuiltTile]) {
    let by_id: BTreeMap<CellId, &BuiltTile> = tiles.iter().map(|t| (t.id, t)).collect();
    for tile in tiles {
        for placed in tile.connectors.iter().filter(|c| c.spec.kind == ConnectorKind::ButterflyInner) {
            let other = grid.neighbor(tile.id, placed.spec.edge).unwrap();
            let facing = by_id[&other]
                .connectors
                .iter()
                .find(|c| c.spec.edge == placed.spec.edge.opposite())
                .unwrap();
            assert_eq!(
                facing.scale, placed.scale,
                "{} {} vs {} {}",
                tile.id, placed.spec.edge, other, facing.spec.edge
            );
        }
    }
}

/// Plain prisms: no frame placement, holes or connectors.
fn prism_config(tile_size: f64) -> TilingConfig {
    TilingConfig::default()
        .with_tile_size(tile_size)
        .with_normalize(NormalizeConfig::default().with_place_frame(false))
        .with_holes(HoleConfig::disabled())
        .with_connectors(ConnectorConfig::disabled())
}

fn read_tiles(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, std::fs::read(&path).unwrap())
        })
        .collect()
}

// =============================================================================
// Flat square, 0.20 m tiles
// =============================================================================

#[test]
fn flat_square_plans_25_tiles() {
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();
    let plan = engine.plan(flat_square()).unwrap();

    assert_eq!((plan.grid.columns(), plan.grid.rows()), (5, 5));
    assert_eq!(plan.tiles.len(), 25);
    assert!(plan.empty.is_empty());
    assert_eq!(plan.flush_count(), 20);
    // Each of the 40 shared edges carries two halves.
    assert_eq!(plan.butterfly_count(), 80);

    let area: f64 = plan.tiles.iter().map(|t| t.cell.footprint.area()).sum();
    assert!((area - 1.0).abs() < 1e-12);
}

#[test]
fn shared_edges_have_opposite_genders() {
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();
    let plan = engine.plan(flat_square()).unwrap();
    let by_id: BTreeMap<CellId, _> = plan.tiles.iter().map(|t| (t.cell.id, t.connectors)).collect();

    for tile in &plan.tiles {
        for spec in tile.connectors.iter().filter(|s| s.kind == ConnectorKind::ButterflyInner) {
            let other = plan.grid.neighbor(tile.cell.id, spec.edge).unwrap();
            let facing = by_id[&other]
                .iter()
                .find(|s| s.edge == spec.edge.opposite())
                .copied()
                .unwrap();
            assert_eq!(facing.kind, ConnectorKind::ButterflyInner);
            assert!(facing.gender.is_some());
            assert_ne!(facing.gender, spec.gender);
        }
    }
}

#[test]
fn flat_square_tiles_are_closed_solids() {
    let config = TilingConfig::default();
    let engine = TilingEngine::new(config.clone()).unwrap();
    let plan = engine.plan(flat_square()).unwrap();
    let tiles = engine.build_tiles(&plan);
    let inset = config.holes.effective_inset();

    assert_eq!(tiles.len(), 25);
    for tile in &tiles {
        assert!(tile.warnings.is_empty(), "{}: {:?}", tile.id, tile.warnings);
        let solid = tile.solid.as_ref().unwrap();
        check_closed_manifold(solid).unwrap();
        assert!(solid.volume() > 0.0);

        let bottom = solid.vertices.iter().map(Vertex::z).fold(f64::INFINITY, f64::min);
        assert_eq!(bottom, config.anchor_z);

        assert_eq!(tile.holes.len(), 4);
        for hole in tile.holes.iter().filter(|h| !h.relocated) {
            let fp = &tile.footprint;
            let dx = (hole.center.x - fp.min.x).min(fp.max.x - hole.center.x);
            let dy = (hole.center.y - fp.min.y).min(fp.max.y - hole.center.y);
            assert!((dx - inset).abs() < 1e-12, "{} {}", tile.id, hole.site);
            assert!((dy - inset).abs() < 1e-12, "{} {}", tile.id, hole.site);
        }

        let step = config.underside.quantization_step;
        for &h in tile.profile.heights() {
            assert!(h >= 0.0);
            assert!(((h / step) - (h / step).round()).abs() < 1e-9);
        }
    }

    let interior = tiles.iter().find(|t| t.id == CellId::new(2, 2)).unwrap();
    assert_eq!(interior.butterflies(), 4);
    let corner = tiles.iter().find(|t| t.id == CellId::new(0, 4)).unwrap();
    assert_eq!(corner.butterflies(), 2);
}

#[test]
fn flat_square_partners_build_matching_butterflies() {
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();
    let plan = engine.plan(flat_square()).unwrap();
    let tiles = engine.build_tiles(&plan);
    assert_partners_agree(&plan.grid, &tiles);
    assert_eq!(tiles.iter().map(BuiltTile::butterflies).sum::<usize>(), 80);
}

// =============================================================================
// Surfaces that stress the cutter
// =============================================================================

#[test]
fn diagonal_top_covers_every_tile() {
    let engine = TilingEngine::new(prism_config(0.2)).unwrap();
    let plan = engine.plan(diagonal_square()).unwrap();
    assert_eq!(plan.tiles.len(), 25);
    assert!(plan.failed.is_empty());
    for tile in &plan.tiles {
        let covered = tile.patch.covered_area();
        assert!((covered - 0.04).abs() < 1e-12, "{}: {covered}", tile.cell.id);
    }

    let tiles = engine.build_tiles(&plan);
    let total: f64 = tiles.iter().map(|t| t.solid.as_ref().unwrap().volume()).sum();
    assert!((total - 0.02).abs() < 1e-12, "{total}");
}

#[test]
fn diagonal_top_builds_like_a_flat_square() {
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();
    let plan = engine.plan(diagonal_square()).unwrap();
    let tiles = engine.build_tiles(&plan);
    assert_eq!(tiles.len(), 25);
    for tile in &tiles {
        assert!(tile.warnings.is_empty(), "{}: {:?}", tile.id, tile.warnings);
        check_closed_manifold(tile.solid.as_ref().unwrap()).unwrap();
    }
    assert_partners_agree(&plan.grid, &tiles);
}

#[test]
fn l_block_drops_the_empty_quarter() {
    let engine = TilingEngine::new(prism_config(0.25)).unwrap();
    let plan = engine.plan(l_block()).unwrap();
    assert_eq!(plan.tiles.len(), 12);
    assert_eq!(
        plan.empty,
        vec![CellId::new(2, 2), CellId::new(3, 2), CellId::new(2, 3), CellId::new(3, 3)]
    );
    let covered: f64 = plan.tiles.iter().map(|t| t.patch.covered_area()).sum();
    assert!((covered - 0.75).abs() < 1e-12);

    let tiles = engine.build_tiles(&plan);
    let total: f64 = tiles.iter().map(|t| t.solid.as_ref().unwrap().volume()).sum();
    assert!((total - 0.75 * 0.02).abs() < 1e-12);
}

#[test]
fn l_block_edges_facing_the_gap_are_flush() {
    let engine = TilingEngine::new(TilingConfig::default().with_tile_size(0.25)).unwrap();
    let plan = engine.plan(l_block()).unwrap();
    let by_id: BTreeMap<CellId, _> = plan.tiles.iter().map(|t| (t.cell.id, t.connectors)).collect();
    // Edge::ALL order: north, east, south, west.
    assert_eq!(by_id[&CellId::new(1, 3)][1].kind, ConnectorKind::FlushOuter);
    assert_eq!(by_id[&CellId::new(2, 1)][0].kind, ConnectorKind::FlushOuter);
    assert_eq!(by_id[&CellId::new(1, 1)][1].kind, ConnectorKind::ButterflyInner);

    let tiles = engine.build_tiles(&plan);
    for tile in &tiles {
        let failed = tile
            .warnings
            .iter()
            .any(|w| matches!(w, TileWarning::SolidFailed { .. }));
        assert!(!failed, "{}: {:?}", tile.id, tile.warnings);
    }
    assert_partners_agree(&plan.grid, &tiles);
}

#[test]
fn run_writes_one_file_per_tile() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();
    let report = engine.run(flat_square(), dir.path()).unwrap();

    assert!(report.is_full_success(), "{report}");
    assert_eq!(report.written.len(), 25);
    assert!((report.footprint_area() - 1.0).abs() < 1e-12);
    let files = read_tiles(dir.path());
    assert_eq!(files.len(), 25);
    assert!(files.contains_key("tile_4_3.stl"));
    for tile in &report.written {
        assert_eq!(tile.path, dir.path().join(tile_file_name(tile.id)));
        assert_eq!(files[&tile_file_name(tile.id)].len(), 84 + 50 * tile.triangles);
    }
}

#[test]
fn identical_runs_are_byte_identical() {
    let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();
    engine.run(flat_square(), a.path()).unwrap();
    engine.run(flat_square(), b.path()).unwrap();
    assert_eq!(read_tiles(a.path()), read_tiles(b.path()));
}

#[test]
fn existing_tiles_are_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let config = TilingConfig::default().with_tile_size(0.5);
    let engine = TilingEngine::new(config.clone()).unwrap();
    engine.run(flat_square(), dir.path()).unwrap();

    let again = engine.run(flat_square(), dir.path()).unwrap();
    assert!(again.written.is_empty());
    assert_eq!(again.degraded.len(), 4);
    assert!(again.degraded.iter().all(|t| !t.exported
        && matches!(t.warnings.last(), Some(TileWarning::ExportRefused { .. }))));

    let engine = TilingEngine::new(config.with_overwrite(true)).unwrap();
    let forced = engine.run(flat_square(), dir.path()).unwrap();
    assert!(forced.is_full_success());
}

#[test]
fn only_mode_writes_a_single_tile() {
    let dir = tempfile::tempdir().unwrap();
    let config = TilingConfig::default().with_only(Some(CellId::new(2, 2)));
    let engine = TilingEngine::new(config).unwrap();
    let report = engine.run(flat_square(), dir.path()).unwrap();

    assert_eq!(report.written.len(), 1);
    assert_eq!(report.written[0].butterflies, 4);
    assert_eq!(read_tiles(dir.path()).into_keys().collect::<Vec<_>>(), vec!["tile_2_2.stl"]);
}

// =============================================================================
// Configuration and input errors
// =============================================================================

#[test]
fn inset_of_015_is_rejected_before_cutting() {
    let config = TilingConfig::default().with_edge_inset(0.15);
    assert!(matches!(
        TilingEngine::new(config),
        Err(ConfigError::InsetTooLarge { .. })
    ));
}

#[test]
fn missing_input_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();
    let result = engine.run_stl(&dir.path().join("missing.stl"), dir.path());
    assert!(matches!(result, Err(TileError::Read(_))));
}

#[test]
fn open_sheet_is_not_a_solid() {
    let mut mesh = IndexedMesh::new();
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        mesh.vertices.push(Vertex::from_coords(x, y, 0.1));
    }
    mesh.faces.push([0, 1, 2]);
    mesh.faces.push([0, 2, 3]);
    let config = TilingConfig {
        normalize: NormalizeConfig {
            max_fill_edges: 0,
            ..NormalizeConfig::default()
        },
        ..TilingConfig::default()
    };
    let engine = TilingEngine::new(config).unwrap();
    assert!(matches!(
        engine.plan(mesh),
        Err(TileError::NonManifoldInput { .. })
    ));
}

// =============================================================================
// Terraces: exact volumes
// =============================================================================

#[test]
fn terraces_split_on_the_wall() {
    let engine = TilingEngine::new(prism_config(1.0)).unwrap();
    let plan = engine.plan(terraces()).unwrap();
    let tiles = engine.build_tiles(&plan);
    let volumes: Vec<f64> = tiles.iter().map(|t| t.solid.as_ref().unwrap().volume()).collect();
    assert_eq!(volumes.len(), 2);
    assert!((volumes[0] - 1.0).abs() < 1e-9);
    assert!((volumes[1] - 2.0).abs() < 1e-9);
}

#[test]
fn terraces_split_across_the_wall() {
    let engine = TilingEngine::new(prism_config(0.8)).unwrap();
    let plan = engine.plan(terraces()).unwrap();
    let tiles = engine.build_tiles(&plan);
    // 3 x 2 grid; the top row is clipped to 0.2 m. Per unit of Y the columns
    // hold 0.8, 1.4 and 0.8.
    let expected = [0.64, 1.12, 0.64, 0.16, 0.28, 0.16];
    assert_eq!(tiles.len(), 6);
    assert_eq!(tiles[4].id, CellId::new(1, 1));
    for (tile, want) in tiles.iter().zip(expected) {
        let solid = tile.solid.as_ref().unwrap();
        check_closed_manifold(solid).unwrap();
        assert!((solid.volume() - want).abs() < 1e-9, "{}: {}", tile.id, solid.volume());
    }
    // Total volume of the input survives the cut.
    let total: f64 = tiles.iter().map(|t| t.solid.as_ref().unwrap().volume()).sum();
    assert!((total - 3.0).abs() < 1e-9);
}

#[test]
fn thin_roof_skips_the_hole() {
    // 4 mm of model over the anchor cannot hold a 5.5 mm cavity.
    let config = TilingConfig::default()
        .with_normalize(NormalizeConfig::default().with_place_frame(false))
        .with_connectors(ConnectorConfig::disabled());
    let engine = TilingEngine::new(config).unwrap();
    let mesh = axis_box(Point3::new(0.0, 0.0, 0.0), Point3::new(0.2, 0.2, 0.004));
    let plan = engine.plan(mesh).unwrap();
    let tiles = engine.build_tiles(&plan);
    assert!(tiles[0].holes.is_empty());
    let skipped: Vec<HoleSite> = tiles[0]
        .warnings
        .iter()
        .filter_map(|w| match w {
            TileWarning::HoleSkipped { site, .. } => Some(*site),
            _ => None,
        })
        .collect();
    assert_eq!(
        skipped,
        vec![HoleSite::SouthWest, HoleSite::SouthEast, HoleSite::NorthEast, HoleSite::NorthWest]
    );
    assert!(tiles[0].solid.is_some());
}
