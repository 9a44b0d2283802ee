//! Surface sheet extraction.
//!
//! Every tile gets a new underside, so only the part of the normalized solid
//! that is visible from above is carried into the cut: upward faces plus
//! the vertical walls standing on them. The input's skirt (vertical faces
//! hanging off the bottom) and its bottom are discarded.

use std::collections::VecDeque;

use mesh_repair::{face_edges, remove_unreferenced_vertices, MeshAdjacency};
use mesh_types::{IndexedMesh, MeshTopology, Vector3};
use tracing::{debug, info};

use crate::error::{TileError, TileResult};

/// Normal Z component separating vertical from sloped faces.
const VERTICAL_TOLERANCE: f64 = 1e-6;

/// Two vertical faces with normals this close are treated as one wall.
const COPLANAR_DOT: f64 = 1.0 - 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Facing {
    Up,
    Vertical,
    Down,
}

fn facing(normal: Option<Vector3<f64>>) -> Facing {
    match normal {
        Some(n) if n.z > VERTICAL_TOLERANCE => Facing::Up,
        Some(n) if n.z.abs() <= VERTICAL_TOLERANCE => Facing::Vertical,
        _ => Facing::Down,
    }
}

/// Statistics of a sheet extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetSummary {
    /// Upward faces kept.
    pub upward: usize,
    /// Vertical wall faces kept.
    pub walls: usize,
    /// Vertical faces dropped as part of the skirt.
    pub skirt: usize,
    /// Downward or degenerate faces dropped.
    pub downward: usize,
}

/// Extract the upward-visible surface sheet of a closed, outward-oriented mesh.
///
/// A vertical face belongs to the skirt when it shares an edge with a
/// downward face, or is reached from such a face across edges shared with
/// coplanar vertical faces. Walls meeting the skirt at an angle (a building
/// wall next to a side cap) are kept.
///
/// # Errors
///
/// Returns [`TileError::NoUpwardSurface`] if no face points upward.
pub fn extract_sheet(mesh: &IndexedMesh) -> TileResult<(IndexedMesh, SheetSummary)> {
    let normals: Vec<Option<Vector3<f64>>> = (0..mesh.face_count())
        .map(|f| mesh.triangle(f).and_then(|t| t.normal()))
        .collect();
    let kinds: Vec<Facing> = normals.iter().map(|n| facing(*n)).collect();
    if !kinds.contains(&Facing::Up) {
        return Err(TileError::NoUpwardSurface);
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let neighbours = |f: usize| {
        face_edges(mesh.faces[f])
            .into_iter()
            .filter_map(|(a, b)| adjacency.faces_for_edge(a, b))
            .flatten()
            .copied()
            .filter(move |&g| g != f)
    };

    let mut skirt = vec![false; kinds.len()];
    let mut queue = VecDeque::new();
    for f in 0..kinds.len() {
        if kinds[f] == Facing::Vertical && neighbours(f).any(|g| kinds[g] == Facing::Down) {
            skirt[f] = true;
            queue.push_back(f);
        }
    }
    while let Some(f) = queue.pop_front() {
        let Some(nf) = normals[f] else { continue };
        for g in neighbours(f) {
            if skirt[g] || kinds[g] != Facing::Vertical {
                continue;
            }
            if normals[g].is_some_and(|ng| ng.dot(&nf) >= COPLANAR_DOT) {
                skirt[g] = true;
                queue.push_back(g);
            }
        }
    }

    let mut summary = SheetSummary::default();
    let mut sheet = IndexedMesh::with_capacity(mesh.vertices.len(), mesh.faces.len());
    sheet.vertices.clone_from(&mesh.vertices);
    for (f, face) in mesh.faces.iter().enumerate() {
        match kinds[f] {
            Facing::Up => summary.upward += 1,
            Facing::Vertical if skirt[f] => {
                summary.skirt += 1;
                continue;
            }
            Facing::Vertical => summary.walls += 1,
            Facing::Down => {
                summary.downward += 1;
                continue;
            }
        }
        sheet.faces.push(*face);
    }
    let removed = remove_unreferenced_vertices(&mut sheet);
    debug!("Sheet compaction removed {removed} vertices");
    info!(
        "Surface sheet: {} upward, {} wall faces ({} skirt, {} downward dropped)",
        summary.upward, summary.walls, summary.skirt, summary.downward
    );
    Ok((sheet, summary))
}
