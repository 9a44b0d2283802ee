//! Hole detection and filling.
//!
//! A hole is a closed loop of boundary edges. Loops are traced against the
//! winding of their neighbouring faces, so the patches produced by
//! [`fill_hole_ear_clipping`] are oriented consistently with the mesh.
//!
//! # Example
//!
//! ```
//! use mesh_types::{axis_box, Point3};
//! use mesh_repair::{fill_holes, MeshAdjacency};
//!
//! let mut mesh = axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
//! mesh.faces.truncate(10); // drop the +X side
//!
//! let filled = fill_holes(&mut mesh, 100).unwrap_or(0);
//! assert_eq!(filled, 1);
//! assert!(MeshAdjacency::build(&mesh.faces).is_watertight());
//! ```

use std::collections::BTreeMap;

use hashbrown::HashSet;
use mesh_types::{IndexedMesh, Point3, Triangle, Vector3};
use tracing::{debug, info, warn};

use crate::adjacency::{face_edges, MeshAdjacency};
use crate::error::{RepairError, RepairResult};

/// A boundary loop representing a hole in the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Ordered vertex indices, running opposite to the adjacent faces.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }

    /// A loop needs at least three vertices to enclose anything.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
    }
}

/// Detect all boundary loops in the mesh.
///
/// Loops are returned in a fixed order (by their smallest starting edge), so
/// repeated runs fill holes identically.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::{MeshAdjacency, detect_holes};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let holes = detect_holes(&mesh, &MeshAdjacency::build(&mesh.faces));
/// assert_eq!(holes.len(), 1);
/// assert_eq!(holes[0].vertices, vec![0, 2, 1]);
/// ```
#[must_use]
pub fn detect_holes(mesh: &IndexedMesh, adjacency: &MeshAdjacency) -> Vec<BoundaryLoop> {
    let boundary: HashSet<(u32, u32)> = adjacency.boundary_edges().into_iter().collect();
    if boundary.is_empty() {
        return Vec::new();
    }
    debug!("Found {} boundary edges", boundary.len());

    // Boundary edges reversed, keyed by start vertex.
    let mut next: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for &face in &mesh.faces {
        for (a, b) in face_edges(face) {
            let key = if a < b { (a, b) } else { (b, a) };
            if boundary.contains(&key) {
                next.entry(b).or_default().push(a);
            }
        }
    }
    for targets in next.values_mut() {
        targets.sort_unstable();
    }

    let mut loops = Vec::new();
    loop {
        let Some(start) = next.iter().find(|(_, t)| !t.is_empty()).map(|(&k, _)| k) else {
            break;
        };
        let mut vertices = vec![start];
        let mut current = start;
        loop {
            let Some(step) = next.get_mut(&current).and_then(|t| {
                if t.is_empty() { None } else { Some(t.remove(0)) }
            }) else {
                warn!("Boundary loop starting at vertex {start} is not closed");
                vertices.clear();
                break;
            };
            if step == start {
                break;
            }
            vertices.push(step);
            current = step;
        }
        if vertices.len() >= 3 {
            loops.push(BoundaryLoop { vertices });
        }
    }

    info!(
        "Detected {} holes, sizes: {:?}",
        loops.len(),
        loops.iter().map(BoundaryLoop::edge_count).collect::<Vec<_>>()
    );
    loops
}

/// Fill a hole using ear clipping in the loop's best-fit plane.
///
/// Falls back to a fan when no ear can be found. Returns the new faces.
#[must_use]
pub fn fill_hole_ear_clipping(mesh: &IndexedMesh, boundary: &BoundaryLoop) -> Vec<[u32; 3]> {
    let n = boundary.vertices.len();
    if n < 3 {
        return Vec::new();
    }

    let positions: Vec<Point3<f64>> = boundary
        .vertices
        .iter()
        .map(|&idx| mesh.vertices[idx as usize].position)
        .collect();
    let hole_normal = newell_normal(&positions);

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let len = remaining.len();
        let ear = (0..len).find(|&i| {
            let prev = remaining[(i + len - 1) % len];
            let next = remaining[(i + 1) % len];
            is_ear(&positions, &remaining, prev, remaining[i], next, &hole_normal)
        });

        let Some(i) = ear else {
            warn!(
                "Ear clipping stuck with {} vertices remaining, using fan triangulation",
                remaining.len()
            );
            break;
        };
        let prev = remaining[(i + len - 1) % len];
        let next = remaining[(i + 1) % len];
        triangles.push([
            boundary.vertices[prev],
            boundary.vertices[remaining[i]],
            boundary.vertices[next],
        ]);
        remaining.remove(i);
    }

    let center = remaining[0];
    for pair in remaining[1..].windows(2) {
        triangles.push([
            boundary.vertices[center],
            boundary.vertices[pair[0]],
            boundary.vertices[pair[1]],
        ]);
    }

    debug!("Filled hole with {n} edges using {} triangles", triangles.len());
    triangles
}

/// Newell normal of a closed polygon, or +Z when degenerate.
fn newell_normal(positions: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    for (i, p) in positions.iter().enumerate() {
        let q = positions[(i + 1) % positions.len()];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    normal.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z)
}

fn is_ear(
    positions: &[Point3<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    hole_normal: &Vector3<f64>,
) -> bool {
    let (a, b, c) = (positions[prev], positions[curr], positions[next]);
    let Some(tri_normal) = Triangle::new(a, b, c).normal() else {
        return false;
    };
    if tri_normal.dot(hole_normal) <= 0.0 {
        return false;
    }

    remaining
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .all(|&idx| !point_in_triangle_projected(&positions[idx], &a, &b, &c, hole_normal))
}

/// Point-in-triangle test after dropping the axis most aligned with `normal`.
fn point_in_triangle_projected(
    p: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    normal: &Vector3<f64>,
) -> bool {
    let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());
    let project = |q: &Point3<f64>| -> (f64, f64) {
        if az >= ax && az >= ay {
            (q.x, q.y)
        } else if ay >= ax {
            (q.z, q.x)
        } else {
            (q.y, q.z)
        }
    };

    let (p, a, b, c) = (project(p), project(v0), project(v1), project(v2));
    let side = |p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)| {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };
    let d1 = side(p, a, b);
    let d2 = side(p, b, c);
    let d3 = side(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Fill all holes with at most `max_hole_edges` edges.
///
/// Larger holes are left open and logged. Returns the number of holes filled.
///
/// # Errors
///
/// Returns [`RepairError::HoleFillFailed`] if a fillable hole yields no
/// triangles.
pub fn fill_holes(mesh: &mut IndexedMesh, max_hole_edges: usize) -> RepairResult<usize> {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let holes = detect_holes(mesh, &adjacency);

    let mut filled = 0;
    for hole in &holes {
        if hole.edge_count() > max_hole_edges {
            warn!(
                "Skipping large hole with {} edges (max: {max_hole_edges})",
                hole.edge_count()
            );
            continue;
        }
        let triangles = fill_hole_ear_clipping(mesh, hole);
        if triangles.is_empty() {
            return Err(RepairError::HoleFillFailed {
                reason: format!("no triangles for hole with {} edges", hole.edge_count()),
            });
        }
        mesh.faces.extend(triangles);
        filled += 1;
    }

    if filled > 0 {
        info!("Filled {filled} holes");
    }
    Ok(filled)
}
