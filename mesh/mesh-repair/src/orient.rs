//! Winding order correction.
//!
//! Faces are flood-filled over shared edges so that neighbours traverse
//! their common edge in opposite directions. Each connected component is then
//! flipped as a whole if its signed volume is negative.

use std::collections::VecDeque;

use mesh_types::IndexedMesh;
use tracing::{debug, info};

use crate::adjacency::{face_edges, MeshAdjacency};
use crate::error::{RepairError, RepairResult};

/// What [`orient_outward`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrientSummary {
    /// Connected components found.
    pub components: usize,
    /// Faces flipped to agree with their neighbours.
    pub faces_flipped: usize,
    /// Components flipped because they were inside-out.
    pub components_inverted: usize,
}

/// Make face winding consistent and outward-facing.
///
/// Requires a manifold mesh (at most two faces per edge). Traversal runs in
/// face-index order, so the result is deterministic.
///
/// # Errors
///
/// Returns [`RepairError::NonManifold`] if an edge has more than two faces,
/// or [`RepairError::NonOrientable`] if no consistent winding exists.
///
/// # Example
///
/// ```
/// use mesh_types::{axis_box, Point3};
/// use mesh_repair::orient_outward;
///
/// let mut mesh = axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// mesh.faces[5].swap(1, 2);
/// mesh.flip_normals();
///
/// let summary = orient_outward(&mut mesh).unwrap_or_default();
/// assert_eq!(summary.components_inverted, 1);
/// assert!(mesh.signed_volume() > 0.0);
/// ```
pub fn orient_outward(mesh: &mut IndexedMesh) -> RepairResult<OrientSummary> {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    if !adjacency.is_manifold() {
        let edges = adjacency.non_manifold_edges();
        return Err(RepairError::NonManifold {
            details: format!(
                "{} edges with more than two faces, first {:?}",
                edges.len(),
                edges[0]
            ),
        });
    }

    let face_count = mesh.faces.len();
    let mut component = vec![usize::MAX; face_count];
    let mut summary = OrientSummary::default();
    let mut queue = VecDeque::new();

    for seed in 0..face_count {
        if component[seed] != usize::MAX {
            continue;
        }
        let id = summary.components;
        summary.components += 1;
        component[seed] = id;
        queue.push_back(seed);

        while let Some(face_idx) = queue.pop_front() {
            let face = mesh.faces[face_idx];
            for (a, b) in face_edges(face) {
                let Some(neighbours) = adjacency.faces_for_edge(a, b) else {
                    continue;
                };
                for &other in neighbours.iter().filter(|&&f| f != face_idx) {
                    // Consistent neighbours run the shared edge as b -> a.
                    let agrees = face_edges(mesh.faces[other]).contains(&(b, a));
                    if component[other] == usize::MAX {
                        if !agrees {
                            mesh.faces[other].swap(1, 2);
                            summary.faces_flipped += 1;
                        }
                        component[other] = id;
                        queue.push_back(other);
                    } else if !agrees {
                        return Err(RepairError::NonOrientable { face: other });
                    }
                }
            }
        }
    }

    let mut volumes = vec![0.0; summary.components];
    for (face_idx, &[i0, i1, i2]) in mesh.faces.iter().enumerate() {
        let (v0, v1, v2) = (mesh.position(i0), mesh.position(i1), mesh.position(i2));
        volumes[component[face_idx]] += v0.coords.dot(&v1.coords.cross(&v2.coords)) / 6.0;
    }
    for (id, volume) in volumes.iter().enumerate() {
        if *volume < 0.0 {
            debug!("Component {id} is inside-out (volume {volume:.3e}), flipping");
            summary.components_inverted += 1;
        }
    }
    if summary.components_inverted > 0 {
        for (face_idx, face) in mesh.faces.iter_mut().enumerate() {
            if volumes[component[face_idx]] < 0.0 {
                face.swap(1, 2);
            }
        }
    }

    if summary.faces_flipped > 0 || summary.components_inverted > 0 {
        info!(
            "Orientation: {} components, {} faces flipped, {} components inverted",
            summary.components, summary.faces_flipped, summary.components_inverted
        );
    }
    Ok(summary)
}

/// Count faces whose winding disagrees with a neighbour across a shared edge.
#[must_use]
pub fn count_inconsistent_edges(mesh: &IndexedMesh) -> usize {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let mut count = 0;
    for (face_idx, &face) in mesh.faces.iter().enumerate() {
        for (a, b) in face_edges(face) {
            let Some(neighbours) = adjacency.faces_for_edge(a, b) else {
                continue;
            };
            count += neighbours
                .iter()
                .filter(|&&f| f > face_idx && face_edges(mesh.faces[f]).contains(&(a, b)))
                .count();
        }
    }
    count
}
