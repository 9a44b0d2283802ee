//! Core mesh types for the city tiler.
//!
//! This crate provides the foundational types shared by every stage of the
//! tiling pipeline:
//!
//! - [`Vertex`] - A point in 3D space
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//! - [`Triangle`] - A concrete triangle with vertex positions
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`Rect`] - Axis-aligned rectangle in the XY plane (tile footprints)
//!
//! # Units
//!
//! All coordinates are `f64` meters at print scale. A 0.20 m tile edge is a
//! 200 mm printed tile.
//!
//! # Coordinate System
//!
//! Uses a **right-handed coordinate system**:
//! - X: east
//! - Y: north
//! - Z: up
//!
//! Face winding is **counter-clockwise (CCW) when viewed from outside**.
//! Normals point outward by the right-hand rule.
//!
//! # Example
//!
//! ```
//! use mesh_types::{axis_box, MeshTopology, Point3};
//!
//! let block = axis_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.02));
//! assert_eq!(block.face_count(), 12);
//! assert!((block.volume() - 0.02).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
mod traits;
mod triangle;
mod vertex;

pub use bounds::{Aabb, Rect};
pub use mesh::{axis_box, IndexedMesh};
pub use traits::{MeshBounds, MeshTopology};
pub use triangle::Triangle;
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};
