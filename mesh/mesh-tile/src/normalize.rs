//! Mesh normalizer: repair, validate and frame the input.

use mesh_repair::{orient_outward, repair_mesh, MeshAdjacency, OrientSummary, RepairSummary};
use mesh_types::{Aabb, IndexedMesh, MeshBounds, MeshTopology, Rect, Vector3};
use tracing::{debug, info};

use crate::config::NormalizeConfig;
use crate::error::{TileError, TileResult};

/// A repaired, outward-oriented closed mesh in the working frame.
#[derive(Debug, Clone)]
pub struct NormalizedMesh {
    /// The mesh.
    pub mesh: IndexedMesh,
    /// Bounds after framing.
    pub bounds: Aabb,
    /// Planar part of `bounds`.
    pub planar: Rect,
    /// What repair changed.
    pub repair: RepairSummary,
    /// What orientation changed.
    pub orient: OrientSummary,
    /// Z translation applied to place the mesh on its base.
    pub lift: f64,
}

/// Repair `mesh`, check that it is a closed manifold, orient it outward and
/// place its lowest point `base_lift` above the anchor plane.
///
/// # Errors
///
/// - [`TileError::EmptyMesh`] for a mesh without faces
/// - [`TileError::NonManifoldInput`] if repair leaves open or non-manifold
///   edges, or the surface cannot be oriented
pub fn normalize(
    mut mesh: IndexedMesh,
    config: &NormalizeConfig,
    anchor_z: f64,
) -> TileResult<NormalizedMesh> {
    if mesh.is_empty() {
        return Err(TileError::EmptyMesh);
    }
    info!(
        "Normalizing mesh: {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    );

    let repair = repair_mesh(&mut mesh, &config.repair_params()).map_err(|e| {
        TileError::NonManifoldInput {
            details: e.to_string(),
        }
    })?;
    if mesh.is_empty() {
        return Err(TileError::EmptyMesh);
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    if !adjacency.is_manifold() {
        return Err(TileError::NonManifoldInput {
            details: format!(
                "{} edges shared by more than two faces",
                adjacency.non_manifold_edge_count()
            ),
        });
    }
    if !adjacency.is_watertight() {
        return Err(TileError::NonManifoldInput {
            details: format!(
                "{} open edges remain after hole filling",
                adjacency.boundary_edge_count()
            ),
        });
    }

    let orient = orient_outward(&mut mesh).map_err(|e| TileError::NonManifoldInput {
        details: e.to_string(),
    })?;

    let mut bounds = mesh.bounds();
    let lift = if config.place_frame {
        anchor_z + config.base_lift - bounds.min.z
    } else {
        0.0
    };
    if lift != 0.0 {
        mesh.translate(Vector3::new(0.0, 0.0, lift));
        bounds = mesh.bounds();
        debug!("Lifted mesh by {lift:.4} to z={:.4}", bounds.min.z);
    }

    let planar = bounds.planar();
    info!(
        "Normalized mesh: {} faces, footprint {:.3} x {:.3}, height {:.3}..{:.3}",
        mesh.face_count(),
        planar.width(),
        planar.height(),
        bounds.min.z,
        bounds.max.z
    );
    Ok(NormalizedMesh {
        mesh,
        bounds,
        planar,
        repair,
        orient,
        lift,
    })
}
