//! Mesh validation and health reporting.

use hashbrown::{HashMap, HashSet};
use mesh_types::IndexedMesh;

use crate::adjacency::{face_edges, MeshAdjacency};
use crate::error::{RepairError, RepairResult};

/// Area below which a face counts as degenerate in a [`MeshReport`].
const DEGENERATE_AREA: f64 = 1e-12;

/// Report of mesh validation results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshReport {
    /// Total number of vertices.
    pub vertex_count: usize,
    /// Total number of faces.
    pub face_count: usize,
    /// Total number of undirected edges.
    pub edge_count: usize,

    /// Edges with only one adjacent face.
    pub boundary_edge_count: usize,
    /// Edges with more than two adjacent faces.
    pub non_manifold_edge_count: usize,
    /// Directed edges used by two faces (neighbours wound against each other).
    pub misoriented_edge_count: usize,
    /// Faces with (near) zero area.
    pub degenerate_face_count: usize,
    /// Faces repeating another face's vertex set.
    pub duplicate_face_count: usize,

    /// Signed volume (positive for outward normals on a closed mesh).
    pub signed_volume: f64,
}

impl MeshReport {
    /// No boundary edges.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.boundary_edge_count == 0
    }

    /// No edge with more than two faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    /// Check if the mesh is ready for printing: closed, manifold,
    /// consistently wound and with positive volume.
    #[must_use]
    pub fn is_printable(&self) -> bool {
        self.face_count > 0
            && self.is_watertight()
            && self.is_manifold()
            && self.misoriented_edge_count == 0
            && self.signed_volume > 0.0
    }

    /// Total count of issues found.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.boundary_edge_count
            + self.non_manifold_edge_count
            + self.misoriented_edge_count
            + self.degenerate_face_count
            + self.duplicate_face_count
    }
}

impl std::fmt::Display for MeshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mesh Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Edges: {}", self.edge_count)?;
        writeln!(f, "  Volume: {:.6e}", self.signed_volume)?;
        writeln!(
            f,
            "  Printable: {}",
            if self.is_printable() { "Yes" } else { "No" }
        )?;

        if self.issue_count() > 0 {
            writeln!(f, "  Issues:")?;
            let rows = [
                ("Boundary edges", self.boundary_edge_count),
                ("Non-manifold edges", self.non_manifold_edge_count),
                ("Misoriented edges", self.misoriented_edge_count),
                ("Degenerate faces", self.degenerate_face_count),
                ("Duplicate faces", self.duplicate_face_count),
            ];
            for (label, count) in rows.into_iter().filter(|(_, c)| *c > 0) {
                writeln!(f, "    {label}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Validate a mesh and return a report of any issues.
///
/// # Example
///
/// ```
/// use mesh_types::{axis_box, Point3};
/// use mesh_repair::validate_mesh;
///
/// let report = validate_mesh(&axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0)));
/// assert!(report.is_printable());
/// assert_eq!(report.edge_count, 18);
/// ```
#[must_use]
pub fn validate_mesh(mesh: &IndexedMesh) -> MeshReport {
    let adjacency = MeshAdjacency::build(&mesh.faces);

    let mut directed: HashMap<(u32, u32), u32> = HashMap::with_capacity(mesh.faces.len() * 3);
    for &face in &mesh.faces {
        for edge in face_edges(face) {
            *directed.entry(edge).or_insert(0) += 1;
        }
    }
    let misoriented_edge_count = directed.values().filter(|&&n| n > 1).count();

    let degenerate_face_count = mesh
        .faces
        .iter()
        .filter(|&&[a, b, c]| {
            let (p0, p1, p2) = (mesh.position(a), mesh.position(b), mesh.position(c));
            (p1 - p0).cross(&(p2 - p0)).norm() * 0.5 < DEGENERATE_AREA
        })
        .count();

    let mut seen: HashSet<[u32; 3]> = HashSet::new();
    let duplicate_face_count = mesh
        .faces
        .iter()
        .filter(|face| {
            let mut key = **face;
            key.sort_unstable();
            !seen.insert(key)
        })
        .count();

    MeshReport {
        vertex_count: mesh.vertices.len(),
        face_count: mesh.faces.len(),
        edge_count: adjacency.edge_count(),
        boundary_edge_count: adjacency.boundary_edge_count(),
        non_manifold_edge_count: adjacency.non_manifold_edge_count(),
        misoriented_edge_count,
        degenerate_face_count,
        duplicate_face_count,
        signed_volume: mesh.signed_volume(),
    }
}

/// Check that a mesh is a closed, consistently oriented 2-manifold.
///
/// Every directed edge must occur exactly once and its reverse exactly once.
/// This is the acceptance test for generated solids, stricter than
/// [`validate_mesh`] because it also rejects vertices where two sheets touch
/// along a doubled edge.
///
/// # Errors
///
/// Returns [`RepairError::EmptyMesh`], [`RepairError::InvalidIndex`] or
/// [`RepairError::NonManifold`] describing the first offending edge.
pub fn check_closed_manifold(mesh: &IndexedMesh) -> RepairResult<()> {
    if mesh.faces.is_empty() {
        return Err(RepairError::EmptyMesh);
    }

    let mut directed: HashMap<(u32, u32), u32> = HashMap::with_capacity(mesh.faces.len() * 3);
    for &face in &mesh.faces {
        if let Some(&index) = face.iter().find(|&&v| v as usize >= mesh.vertices.len()) {
            return Err(RepairError::InvalidIndex {
                index,
                vertex_count: mesh.vertices.len(),
            });
        }
        for edge in face_edges(face) {
            *directed.entry(edge).or_insert(0) += 1;
        }
    }

    let mut bad: Vec<((u32, u32), u32, u32)> = directed
        .iter()
        .filter_map(|(&(a, b), &n)| {
            let reverse = directed.get(&(b, a)).copied().unwrap_or(0);
            (n != 1 || reverse != 1).then_some(((a, b), n, reverse))
        })
        .collect();
    if bad.is_empty() {
        return Ok(());
    }

    bad.sort_unstable();
    let ((a, b), n, reverse) = bad[0];
    Err(RepairError::NonManifold {
        details: format!(
            "edge {a}->{b} used {n} times, reverse used {reverse} times ({} bad edges)",
            bad.len()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{axis_box, Point3, Vertex};

    fn unit_cube() -> IndexedMesh {
        axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn cube_is_printable() {
        let report = validate_mesh(&unit_cube());
        assert!(report.is_printable());
        assert_eq!(report.issue_count(), 0);
        assert!(check_closed_manifold(&unit_cube()).is_ok());
    }

    #[test]
    fn single_triangle_has_boundary() {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);

        let report = validate_mesh(&mesh);
        assert_eq!(report.boundary_edge_count, 3);
        assert!(!report.is_printable());
        assert!(matches!(
            check_closed_manifold(&mesh),
            Err(RepairError::NonManifold { .. })
        ));
    }

    #[test]
    fn flipped_face_is_misoriented() {
        let mut mesh = unit_cube();
        mesh.faces[3].swap(1, 2);
        let report = validate_mesh(&mesh);
        assert!(report.is_watertight());
        assert!(report.misoriented_edge_count > 0);
        assert!(!report.is_printable());
        assert!(check_closed_manifold(&mesh).is_err());
    }

    #[test]
    fn inverted_cube_is_not_printable() {
        let mut mesh = unit_cube();
        mesh.flip_normals();
        let report = validate_mesh(&mesh);
        assert_eq!(report.misoriented_edge_count, 0);
        assert!(report.signed_volume < 0.0);
        assert!(!report.is_printable());
    }

    #[test]
    fn two_cubes_sharing_an_edge_are_rejected() {
        let mut mesh = unit_cube();
        let mut other = unit_cube();
        other.translate(mesh_types::Vector3::new(1.0, 1.0, 0.0));
        mesh.merge(&other);
        assert_eq!(crate::weld_vertices(&mut mesh, 1e-9), 2);
        assert!(check_closed_manifold(&mesh).is_err());
    }

    #[test]
    fn invalid_index_is_reported() {
        let mut mesh = unit_cube();
        mesh.faces.push([0, 1, 99]);
        assert!(matches!(
            check_closed_manifold(&mesh),
            Err(RepairError::InvalidIndex { index: 99, .. })
        ));
    }

    #[test]
    fn report_display_lists_issues() {
        let mut mesh = unit_cube();
        mesh.faces.pop();
        let text = validate_mesh(&mesh).to_string();
        assert!(text.contains("Boundary edges: 3"));
        assert!(text.contains("Printable: No"));
    }
}
