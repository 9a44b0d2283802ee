//! Mesh repair operations for city models.
//!
//! This crate provides tools for:
//! - Mesh validation (manifold, watertight and orientation checks)
//! - Vertex welding (merge nearby vertices)
//! - Degenerate and duplicate face removal
//! - Unreferenced vertex removal
//! - Hole detection and filling
//! - Winding order correction
//!
//! # Example
//!
//! ```
//! use mesh_types::{axis_box, Point3};
//! use mesh_repair::{orient_outward, repair_mesh, validate_mesh, RepairParams};
//!
//! let mut mesh = axis_box(Point3::origin(), Point3::new(1.0, 1.0, 0.02));
//! mesh.faces.pop();
//!
//! let summary = repair_mesh(&mut mesh, &RepairParams::default()).unwrap_or_default();
//! assert_eq!(summary.holes_filled, 1);
//! let _ = orient_outward(&mut mesh);
//! assert!(validate_mesh(&mesh).is_printable());
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod adjacency;
mod error;
pub mod holes;
pub mod orient;
mod repair;
mod validate;

pub use adjacency::{face_edges, MeshAdjacency};
pub use error::{RepairError, RepairResult};
pub use holes::{detect_holes, fill_holes, BoundaryLoop};
pub use orient::{count_inconsistent_edges, orient_outward, OrientSummary};
pub use repair::{
    remove_degenerate_triangles, remove_duplicate_faces, remove_unreferenced_vertices,
    repair_mesh, weld_vertices, RepairParams, RepairSummary,
};
pub use validate::{check_closed_manifold, validate_mesh, MeshReport};
