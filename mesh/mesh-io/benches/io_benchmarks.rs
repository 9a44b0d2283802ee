//! Benchmarks for mesh-io operations.
//!
//! Run with: cargo bench -p mesh-io
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-io -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-io -- --baseline main

#![allow(missing_docs, clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_io::{StlEncoding, read_stl, save_stl, write_stl};
use mesh_types::{IndexedMesh, Vertex};
use tempfile::tempdir;

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Rolling `n` x `n` terrain sheet, as a tile surface would look.
fn terrain_sheet(n: usize) -> IndexedMesh {
    let mut mesh = IndexedMesh::with_capacity(n * n, 2 * (n - 1) * (n - 1));
    let step = 0.2 / (n - 1) as f64;
    for j in 0..n {
        for i in 0..n {
            let (x, y) = (i as f64 * step, j as f64 * step);
            let z = 0.02 + 0.01 * (x * 40.0).sin() * (y * 30.0).cos();
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
    }
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let a = (j * n + i) as u32;
            let (b, c, d) = (a + 1, a + 1 + n as u32, a + n as u32);
            mesh.faces.push([a, b, c]);
            mesh.faces.push([a, c, d]);
        }
    }
    mesh
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Encode");

    for n in [32, 128, 256] {
        let mesh = terrain_sheet(n);
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        for (name, encoding) in [("binary", StlEncoding::Binary), ("ascii", StlEncoding::Ascii)] {
            group.bench_with_input(BenchmarkId::new(name, n), &mesh, |b, mesh| {
                b.iter(|| {
                    let mut bytes = Vec::with_capacity(84 + mesh.faces.len() * 50);
                    let _ = write_stl(black_box(mesh), &mut bytes, encoding);
                    bytes
                });
            });
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Decode");

    for n in [32, 128, 256] {
        let mesh = terrain_sheet(n);
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        for (name, encoding) in [("binary", StlEncoding::Binary), ("ascii", StlEncoding::Ascii)] {
            let mut bytes = Vec::new();
            let _ = write_stl(&mesh, &mut bytes, encoding);
            group.bench_with_input(BenchmarkId::new(name, n), &bytes, |b, bytes| {
                b.iter(|| read_stl(black_box(&bytes[..])));
            });
        }
    }

    group.finish();
}

fn bench_save_file(c: &mut Criterion) {
    let Ok(dir) = tempdir() else {
        return;
    };
    let mesh = terrain_sheet(128);
    let path = dir.path().join("tile_0_0.stl");

    c.bench_function("save_binary_128", |b| {
        b.iter(|| save_stl(black_box(&mesh), &path, StlEncoding::Binary, true));
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_save_file);
criterion_main!(benches);
