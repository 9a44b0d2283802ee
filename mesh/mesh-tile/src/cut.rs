//! Tile boundary cutter.
//!
//! The surface sheet is first gathered per cell (every face whose planar
//! bounds come within the connector margin of the cell), then cut with the
//! tile outline. Cutting splits each face into convex pieces by every
//! outline line and keeps the pieces inside the outline. The kept pieces are
//! triangulated and welded by exact position, and the open boundary of the
//! result is traced into rims.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use mesh_repair::face_edges;
use mesh_types::{IndexedMesh, Point2, Point3, Vertex};
use smallvec::smallvec;
use tracing::debug;

use crate::error::{BuildError, BuildResult};
use crate::grid::Grid;
use crate::outline::Outline;
use crate::planar::{overlaps, planar_bounds, split_piece, triangulate_convex, twice_area, Piece, Side};

/// Upward area under which a patch counts as empty.
const EMPTY_AREA: f64 = 1e-12;

/// Relative area a piece may lose to dropped slivers.
const AREA_SLACK: f64 = 1e-9;

/// Cut surface of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePatch {
    /// Welded, consistently wound surface triangles.
    pub mesh: IndexedMesh,
    /// Boundary loops as vertex indices. Outer loops run counter-clockwise
    /// seen from above.
    pub rims: Vec<Vec<u32>>,
}

impl SurfacePatch {
    /// Planar projection of every rim.
    #[must_use]
    pub fn rim_polygons(&self) -> Vec<Vec<Point2<f64>>> {
        self.rims
            .iter()
            .map(|rim| rim.iter().map(|&v| self.mesh.vertices[v as usize].planar()).collect())
            .collect()
    }

    /// Area of the patch seen from above.
    #[must_use]
    pub fn covered_area(&self) -> f64 {
        self.mesh.upward_planar_area()
    }
}

/// Split the sheet into one source mesh per grid cell, in row-major order.
///
/// A face goes to every cell its planar bounds, grown by `margin`, touch.
/// Faces keep their relative order, so each source is deterministic.
#[must_use]
pub fn gather_cells(sheet: &IndexedMesh, grid: &Grid, margin: f64) -> Vec<IndexedMesh> {
    let mut sources = vec![IndexedMesh::new(); grid.len()];
    let mut remaps: Vec<HashMap<u32, u32>> = vec![HashMap::new(); grid.len()];

    for &face in &sheet.faces {
        let tri = face.map(|v| sheet.position(v));
        let bounds = planar_bounds(&tri).expanded(margin);
        let Some((c0, c1)) = grid.column_span(bounds.min.x, bounds.max.x) else {
            continue;
        };
        let Some((r0, r1)) = grid.row_span(bounds.min.y, bounds.max.y) else {
            continue;
        };
        for row in r0..=r1 {
            for col in c0..=c1 {
                let k = row * grid.columns() + col;
                let source = &mut sources[k];
                let remap = &mut remaps[k];
                let local = face.map(|v| {
                    *remap
                        .entry(v)
                        .or_insert_with(|| source.push_vertex(sheet.vertices[v as usize]))
                });
                source.faces.push(local);
            }
        }
    }
    sources
}

/// Cut `source` with `outline`.
///
/// # Errors
///
/// Returns [`BuildError::EmptyPatch`] when nothing of the source lies inside
/// the outline, [`BuildError::Triangulation`] when a kept piece cannot be
/// fully covered by triangles, or a rim error from [`trace_rims`].
pub fn cut_patch(source: &IndexedMesh, outline: &Outline) -> BuildResult<SurfacePatch> {
    let bounds = outline.bounds();
    let lines = outline.lines();
    let mut welder = Welder::default();

    for &face in &source.faces {
        let tri = face.map(|v| source.position(v));
        if !overlaps(&planar_bounds(&tri), &bounds) {
            continue;
        }
        let Some(normal) = (tri[1] - tri[0]).cross(&(tri[2] - tri[0])).try_normalize(0.0) else {
            continue;
        };

        let mut pieces: Vec<Piece> = vec![smallvec![tri[0], tri[1], tri[2]]];
        for line in &lines {
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for piece in &pieces {
                let (front, back) = split_piece(piece, line);
                next.extend(front);
                next.extend(back);
            }
            pieces = next;
        }

        for piece in pieces {
            if outline.classify(&centroid(&piece)) != Side::Inside {
                continue;
            }
            let tris = triangulate_convex(&piece, &normal);
            let expected = twice_area(&piece, &normal);
            let covered: f64 = tris
                .iter()
                .map(|&[a, b, c]| twice_area(&[piece[a], piece[b], piece[c]], &normal))
                .sum();
            let size = piece.iter().map(|p| (p - piece[0]).norm_squared()).fold(0.0, f64::max);
            if (expected - covered).abs() > AREA_SLACK * (expected.abs() + size) {
                return Err(BuildError::Triangulation {
                    reason: format!(
                        "piece of area {:.3e} triangulated to {:.3e}",
                        expected / 2.0,
                        covered / 2.0
                    ),
                });
            }
            for [a, b, c] in tris {
                let face = [welder.index(piece[a]), welder.index(piece[b]), welder.index(piece[c])];
                welder.mesh.faces.push(face);
            }
        }
    }

    let mesh = welder.mesh;
    if mesh.faces.is_empty() || mesh.upward_planar_area() <= EMPTY_AREA {
        return Err(BuildError::EmptyPatch);
    }
    let rims = trace_rims(&mesh)?;
    debug!(
        "Cut patch: {} faces, {} vertices, {} rims",
        mesh.faces.len(),
        mesh.vertices.len(),
        rims.len()
    );
    Ok(SurfacePatch { mesh, rims })
}

fn centroid(piece: &[Point3<f64>]) -> Point2<f64> {
    #[allow(clippy::cast_precision_loss)]
    let n = piece.len() as f64;
    let (x, y) = piece.iter().fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Point2::new(x / n, y / n)
}

/// Merges bit-identical points.
#[derive(Default)]
struct Welder {
    mesh: IndexedMesh,
    index: HashMap<[u64; 3], u32>,
}

impl Welder {
    fn index(&mut self, p: Point3<f64>) -> u32 {
        // `+ 0.0` folds -0.0 into 0.0.
        let key = [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()];
        let mesh = &mut self.mesh;
        *self
            .index
            .entry(key)
            .or_insert_with(|| mesh.push_vertex(Vertex::new(p)))
    }
}

/// Trace the open boundary of a surface into closed loops.
///
/// Loops start at their smallest vertex index and are listed in order of
/// that vertex.
///
/// # Errors
///
/// - [`BuildError::NonManifoldPatch`] if a directed edge is used twice
/// - [`BuildError::PinchedRim`] if a vertex starts two boundary edges
/// - [`BuildError::OpenRim`] if a boundary chain does not close
pub fn trace_rims(mesh: &IndexedMesh) -> BuildResult<Vec<Vec<u32>>> {
    let mut directed: HashMap<(u32, u32), u32> = HashMap::with_capacity(mesh.faces.len() * 3);
    for &face in &mesh.faces {
        for edge in face_edges(face) {
            *directed.entry(edge).or_insert(0) += 1;
        }
    }
    if let Some(&(a, b)) = directed
        .iter()
        .filter(|&(_, &n)| n > 1)
        .map(|(edge, _)| edge)
        .min()
    {
        return Err(BuildError::NonManifoldPatch { a, b });
    }

    let mut boundary: Vec<(u32, u32)> = directed
        .keys()
        .filter(|&&(a, b)| !directed.contains_key(&(b, a)))
        .copied()
        .collect();
    boundary.sort_unstable();

    let mut next: BTreeMap<u32, u32> = BTreeMap::new();
    for (a, b) in boundary {
        if next.insert(a, b).is_some() {
            return Err(BuildError::PinchedRim { vertex: a });
        }
    }

    let mut rims = Vec::new();
    while let Some((start, mut cur)) = next.pop_first() {
        let mut rim = vec![start];
        while cur != start {
            rim.push(cur);
            cur = next.remove(&cur).ok_or(BuildError::OpenRim { vertex: cur })?;
        }
        rims.push(rim);
    }
    Ok(rims)
}
