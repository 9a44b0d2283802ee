//! Benchmarks for the tiling stages on rolling terrain.
//!
//! Run with: cargo bench -p mesh-tile
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-tile -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-tile -- --baseline main

#![allow(missing_docs, clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_tile::cut::cut_patch;
use mesh_tile::solid::build_solid;
use mesh_tile::{CellId, Grid, Outline, TilingConfig, TilingEngine, extract_sheet};
use mesh_types::{IndexedMesh, Point2, Rect, Vertex};

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Closed 1 m x 1 m heightfield block on an `n` x `n` vertex grid.
fn terrain_block(n: usize) -> IndexedMesh {
    let mut mesh = IndexedMesh::new();
    let top = |i: usize, j: usize| (j * n + i) as u32;
    let bottom = |i: usize, j: usize| (n * n + j * n + i) as u32;
    let step = 1.0 / (n - 1) as f64;

    for floor in [false, true] {
        for j in 0..n {
            for i in 0..n {
                let (x, y) = (i as f64 * step, j as f64 * step);
                let z = if floor {
                    0.0
                } else {
                    0.05 + 0.02 * (x * 7.0).sin() * (y * 5.0).cos()
                };
                mesh.vertices.push(Vertex::from_coords(x, y, z));
            }
        }
    }

    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let (a, b, c, d) = (top(i, j), top(i + 1, j), top(i + 1, j + 1), top(i, j + 1));
            mesh.faces.push([a, b, c]);
            mesh.faces.push([a, c, d]);
            let (a, b, c, d) = (bottom(i, j), bottom(i + 1, j), bottom(i + 1, j + 1), bottom(i, j + 1));
            mesh.faces.push([a, c, b]);
            mesh.faces.push([a, d, c]);
        }
    }

    let mut ring = Vec::new();
    ring.extend((0..n - 1).map(|i| (i, 0)));
    ring.extend((0..n - 1).map(|j| (n - 1, j)));
    ring.extend((1..n).rev().map(|i| (i, n - 1)));
    ring.extend((1..n).rev().map(|j| (0, j)));
    for k in 0..ring.len() {
        let (ia, ja) = ring[k];
        let (ib, jb) = ring[(k + 1) % ring.len()];
        mesh.faces.push([top(ib, jb), top(ia, ja), bottom(ia, ja)]);
        mesh.faces.push([top(ib, jb), bottom(ia, ja), bottom(ib, jb)]);
    }

    mesh
}

fn unit_grid() -> Grid {
    Grid::new(Rect::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)), 0.2).unwrap()
}

// =============================================================================
// Per-tile Benchmarks
// =============================================================================

fn bench_cut(c: &mut Criterion) {
    let mut group = c.benchmark_group("cut");
    let cell = unit_grid().cell(CellId::new(2, 2)).unwrap();
    let outline = Outline::rect(cell.footprint);

    for n in [17, 33, 65] {
        let (sheet, _) = extract_sheet(&terrain_block(n)).unwrap();
        group.throughput(Throughput::Elements(sheet.faces.len() as u64));
        group.bench_with_input(BenchmarkId::new("center_tile", n), &sheet, |b, sheet| {
            b.iter(|| cut_patch(black_box(sheet), &outline));
        });
    }

    group.finish();
}

fn bench_solid(c: &mut Criterion) {
    let mut group = c.benchmark_group("solid");
    let cell = unit_grid().cell(CellId::new(2, 2)).unwrap();
    let outline = Outline::rect(cell.footprint);

    for n in [17, 33, 65] {
        let (sheet, _) = extract_sheet(&terrain_block(n)).unwrap();
        let patch = cut_patch(&sheet, &outline).unwrap();
        group.throughput(Throughput::Elements(patch.mesh.faces.len() as u64));
        group.bench_with_input(BenchmarkId::new("center_tile", n), &patch, |b, patch| {
            b.iter(|| build_solid(black_box(patch), &[], 0.0));
        });
    }

    group.finish();
}

// =============================================================================
// Pipeline Benchmarks
// =============================================================================

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let engine = TilingEngine::new(TilingConfig::default()).unwrap();

    for n in [17, 33] {
        let block = terrain_block(n);
        group.throughput(Throughput::Elements(block.faces.len() as u64));
        group.bench_with_input(BenchmarkId::new("plan", n), &block, |b, block| {
            b.iter(|| engine.plan(black_box(block.clone())));
        });

        let plan = engine.plan(block).unwrap();
        group.bench_with_input(BenchmarkId::new("build_25_tiles", n), &plan, |b, plan| {
            b.iter(|| engine.build_tiles(black_box(plan)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cut, bench_solid, bench_pipeline);
criterion_main!(benches);
