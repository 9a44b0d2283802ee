//! Error types for mesh repair operations.

use thiserror::Error;

/// Result type for repair operations.
pub type RepairResult<T> = Result<T, RepairError>;

/// Errors that can occur during mesh repair.
#[derive(Debug, Error)]
pub enum RepairError {
    /// Mesh is empty (no vertices or faces).
    #[error("mesh is empty")]
    EmptyMesh,

    /// Mesh has invalid indices.
    #[error("invalid vertex index {index} (mesh has {vertex_count} vertices)")]
    InvalidIndex {
        /// The invalid index.
        index: u32,
        /// Total number of vertices in the mesh.
        vertex_count: usize,
    },

    /// Mesh is not a closed manifold.
    #[error("mesh is not manifold: {details}")]
    NonManifold {
        /// Description of the non-manifold condition.
        details: String,
    },

    /// Face windings cannot be made consistent (Mobius-like surface).
    #[error("surface is not orientable (conflict at face {face})")]
    NonOrientable {
        /// Face where the conflicting orientation was found.
        face: usize,
    },

    /// Hole filling failed.
    #[error("failed to fill holes: {reason}")]
    HoleFillFailed {
        /// Reason for failure.
        reason: String,
    },
}
