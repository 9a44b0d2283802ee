//! Core mesh cleanup operations.
//!
//! Removes the defects that exported city models usually carry: sliver
//! triangles, vertices duplicated along tile seams of the source data,
//! doubled faces and stray vertices.

use hashbrown::{HashMap, HashSet};
use mesh_types::IndexedMesh;
use nalgebra::Point3;
use tracing::{debug, info};

use crate::error::RepairResult;
use crate::holes::fill_holes;

/// Configuration parameters for mesh repair.
///
/// Thresholds are in mesh units (meters at print scale for city models).
///
/// # Example
///
/// ```
/// use mesh_repair::RepairParams;
///
/// let params = RepairParams::default()
///     .with_weld_epsilon(5e-5)
///     .with_max_fill_edges(0);
/// assert_eq!(params.max_fill_edges, 0);
/// ```
#[derive(Debug, Clone)]
pub struct RepairParams {
    /// Vertices closer than this are merged. Default: `1e-4` (0.1 mm).
    pub weld_epsilon: f64,

    /// Triangles with area below this are removed. Default: `1e-12`.
    pub degenerate_area_threshold: f64,

    /// Largest boundary loop (in edges) closed by hole filling.
    /// `0` disables filling. Default: `1000`.
    pub max_fill_edges: usize,

    /// Whether to compact the vertex array after repair. Default: `true`.
    pub remove_unreferenced: bool,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-4,
            degenerate_area_threshold: 1e-12,
            max_fill_edges: 1000,
            remove_unreferenced: true,
        }
    }
}

impl RepairParams {
    /// Conservative settings for exact, CAD-generated input.
    ///
    /// Only bit-identical vertices are merged and no holes are filled.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            weld_epsilon: 1e-12,
            degenerate_area_threshold: 1e-18,
            max_fill_edges: 0,
            remove_unreferenced: true,
        }
    }

    /// Set the vertex welding distance.
    #[must_use]
    pub fn with_weld_epsilon(mut self, epsilon: f64) -> Self {
        self.weld_epsilon = epsilon;
        self
    }

    /// Set the minimum triangle area.
    #[must_use]
    pub fn with_degenerate_area_threshold(mut self, threshold: f64) -> Self {
        self.degenerate_area_threshold = threshold;
        self
    }

    /// Set the largest hole that is filled.
    #[must_use]
    pub fn with_max_fill_edges(mut self, edges: usize) -> Self {
        self.max_fill_edges = edges;
        self
    }

    /// Set whether to remove unreferenced vertices after repair.
    #[must_use]
    pub fn with_remove_unreferenced(mut self, remove: bool) -> Self {
        self.remove_unreferenced = remove;
        self
    }
}

/// Remove triangles with area below threshold.
///
/// Faces with repeated indices are always removed. Returns the number of
/// triangles removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_degenerate_triangles;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(5.0, 0.0, 0.0)); // collinear
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(remove_degenerate_triangles(&mut mesh, 1e-9), 1);
/// ```
pub fn remove_degenerate_triangles(mesh: &mut IndexedMesh, area_threshold: f64) -> usize {
    let original_count = mesh.faces.len();
    let vertices = &mesh.vertices;

    mesh.faces.retain(|&[i0, i1, i2]| {
        if i0 == i1 || i1 == i2 || i0 == i2 {
            return false;
        }
        let v0 = vertices[i0 as usize].position;
        let v1 = vertices[i1 as usize].position;
        let v2 = vertices[i2 as usize].position;
        (v1 - v0).cross(&(v2 - v0)).norm() * 0.5 >= area_threshold
    });

    original_count - mesh.faces.len()
}

/// Weld vertices that are within `epsilon` of each other.
///
/// Uses a spatial hash with cells of `2 * epsilon` and scans the 3x3x3
/// neighborhood. The lowest index in a cluster survives, so the result does
/// not depend on hash iteration order. Faces collapsed by the weld are
/// dropped. Returns the number of vertices merged; merged vertices stay in
/// the array until [`remove_unreferenced_vertices`] runs.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::weld_vertices;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.00001, 0.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([0, 3, 2]);
///
/// assert_eq!(weld_vertices(&mut mesh, 1e-4), 1);
/// assert_eq!(mesh.faces[1], [0, 1, 2]);
/// ```
#[allow(clippy::cast_possible_truncation)]
// Truncation: mesh indices are u32
pub fn weld_vertices(mesh: &mut IndexedMesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() || epsilon <= 0.0 {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        spatial_hash
            .entry(pos_to_cell(&vertex.position, cell_size))
            .or_default()
            .push(idx as u32);
    }

    let mut remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged_count = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if remap[idx as usize] != idx {
            continue;
        }
        let (cx, cy, cz) = pos_to_cell(&vertex.position, cell_size);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || remap[other as usize] != other {
                            continue;
                        }
                        let other_pos = mesh.vertices[other as usize].position;
                        if (vertex.position - other_pos).norm() < epsilon {
                            remap[other as usize] = idx;
                            merged_count += 1;
                        }
                    }
                }
            }
        }
    }

    if merged_count == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v as usize];
        }
    }
    mesh.faces
        .retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);

    debug!("Welded {merged_count} vertices (epsilon {epsilon:e})");
    merged_count
}

#[allow(clippy::cast_possible_truncation)]
// Truncation: coordinates far beyond i64 cells are not meaningful mesh data
fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

/// Remove unreferenced vertices and compact the vertex array.
///
/// Surviving vertices keep their relative order. Returns the number of
/// vertices removed.
#[allow(clippy::cast_possible_truncation)]
// Truncation: mesh indices are u32
pub fn remove_unreferenced_vertices(mesh: &mut IndexedMesh) -> usize {
    let original_count = mesh.vertices.len();

    let mut referenced = vec![false; original_count];
    for face in &mesh.faces {
        for &v in face {
            referenced[v as usize] = true;
        }
    }

    let mut remap = vec![u32::MAX; original_count];
    let mut kept = Vec::with_capacity(original_count);
    for (old_idx, vertex) in mesh.vertices.iter().enumerate() {
        if referenced[old_idx] {
            remap[old_idx] = kept.len() as u32;
            kept.push(*vertex);
        }
    }

    let removed = original_count - kept.len();
    if removed == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v as usize];
        }
    }
    mesh.vertices = kept;
    removed
}

/// Remove duplicate faces, keeping the first occurrence.
///
/// Faces are duplicates if they use the same three vertices, regardless of
/// starting vertex or winding.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_duplicate_faces;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([2, 1, 0]);
///
/// assert_eq!(remove_duplicate_faces(&mut mesh), 1);
/// ```
pub fn remove_duplicate_faces(mesh: &mut IndexedMesh) -> usize {
    let original_count = mesh.faces.len();
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(original_count);

    mesh.faces.retain(|face| {
        let mut key = *face;
        key.sort_unstable();
        seen.insert(key)
    });

    original_count - mesh.faces.len()
}

/// Run the cleanup pipeline on a mesh.
///
/// 1. Remove degenerate triangles
/// 2. Weld nearby vertices
/// 3. Remove duplicate faces
/// 4. Fill holes up to `max_fill_edges`
/// 5. Remove unreferenced vertices
///
/// # Errors
///
/// Returns [`RepairError::HoleFillFailed`](crate::RepairError::HoleFillFailed)
/// if a hole within the size limit cannot be triangulated.
///
/// # Example
///
/// ```
/// use mesh_types::{axis_box, Point3};
/// use mesh_repair::{repair_mesh, RepairParams};
///
/// let mut mesh = axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// let summary = repair_mesh(&mut mesh, &RepairParams::default()).unwrap_or_default();
/// assert!(!summary.had_changes());
/// ```
pub fn repair_mesh(mesh: &mut IndexedMesh, params: &RepairParams) -> RepairResult<RepairSummary> {
    let initial_vertices = mesh.vertices.len();
    let initial_faces = mesh.faces.len();

    let degenerates_removed = remove_degenerate_triangles(mesh, params.degenerate_area_threshold);
    let vertices_welded = weld_vertices(mesh, params.weld_epsilon);
    let duplicates_removed = remove_duplicate_faces(mesh);
    let holes_filled = if params.max_fill_edges > 0 {
        fill_holes(mesh, params.max_fill_edges)?
    } else {
        0
    };
    let unreferenced_removed = if params.remove_unreferenced {
        remove_unreferenced_vertices(mesh)
    } else {
        0
    };

    let summary = RepairSummary {
        initial_vertices,
        initial_faces,
        final_vertices: mesh.vertices.len(),
        final_faces: mesh.faces.len(),
        vertices_welded,
        degenerates_removed,
        duplicates_removed,
        holes_filled,
        unreferenced_removed,
    };
    if summary.had_changes() {
        info!("{summary}");
    }
    Ok(summary)
}

/// What a [`repair_mesh`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairSummary {
    /// Number of vertices before repair.
    pub initial_vertices: usize,
    /// Number of faces before repair.
    pub initial_faces: usize,
    /// Number of vertices after repair.
    pub final_vertices: usize,
    /// Number of faces after repair.
    pub final_faces: usize,
    /// Number of vertices merged by welding.
    pub vertices_welded: usize,
    /// Number of degenerate triangles removed.
    pub degenerates_removed: usize,
    /// Number of duplicate faces removed.
    pub duplicates_removed: usize,
    /// Number of boundary loops closed.
    pub holes_filled: usize,
    /// Number of unreferenced vertices removed.
    pub unreferenced_removed: usize,
}

impl RepairSummary {
    /// Check if any repairs were performed.
    #[must_use]
    pub fn had_changes(&self) -> bool {
        self.vertices_welded > 0
            || self.degenerates_removed > 0
            || self.duplicates_removed > 0
            || self.holes_filled > 0
            || self.unreferenced_removed > 0
    }
}

impl std::fmt::Display for RepairSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repair: {} verts ({} welded, {} unreferenced), {} faces ({} degenerate, {} duplicate, {} holes filled)",
            self.final_vertices,
            self.vertices_welded,
            self.unreferenced_removed,
            self.final_faces,
            self.degenerates_removed,
            self.duplicates_removed,
            self.holes_filled,
        )
    }
}
