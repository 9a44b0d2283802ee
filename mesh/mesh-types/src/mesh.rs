//! Indexed triangle mesh.

use crate::{Aabb, MeshBounds, MeshTopology, Triangle, Vertex};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
///
/// Input city meshes, tile solids and cavity shells all use this type.
/// Faces reference vertices by `u32` index.
///
/// # Winding Order
///
/// Faces use **counter-clockwise (CCW) winding** when viewed from outside.
/// This means normals point outward by the right-hand rule.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex, MeshTopology};
///
/// let mut mesh = IndexedMesh::new();
/// let a = mesh.push_vertex(Vertex::from_coords(0.0, 0.0, 0.0));
/// let b = mesh.push_vertex(Vertex::from_coords(1.0, 0.0, 0.0));
/// let c = mesh.push_vertex(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([a, b, c]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Create a mesh from vertices and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Append a vertex and return its index.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, so vertex counts > 4B are unsupported
    pub fn push_vertex(&mut self, vertex: Vertex) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    /// Position of vertex `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds. Callers index with face entries
    /// that have already been validated.
    #[inline]
    #[must_use]
    pub fn position(&self, index: u32) -> Point3<f64> {
        self.vertices[index as usize].position
    }

    /// Translate mesh by the given vector.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Sum of signed tetrahedra formed by each face and the origin. Positive
    /// for a closed mesh with outward normals, negative when inside-out.
    /// Not meaningful for open meshes.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;

        for &[i0, i1, i2] in &self.faces {
            let v0 = &self.vertices[i0 as usize].position;
            let v1 = &self.vertices[i1 as usize].position;
            let v2 = &self.vertices[i2 as usize].position;

            // v0 · (v1 × v2)
            let cross = Vector3::new(
                v1.y.mul_add(v2.z, -(v1.z * v2.y)),
                v1.z.mul_add(v2.x, -(v1.x * v2.z)),
                v1.x.mul_add(v2.y, -(v1.y * v2.x)),
            );
            volume += v0.z.mul_add(cross.z, v0.x.mul_add(cross.x, v0.y * cross.y));
        }

        volume / 6.0
    }

    /// Absolute value of [`signed_volume`](Self::signed_volume).
    #[inline]
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// True if the signed volume is negative.
    #[inline]
    #[must_use]
    pub fn is_inside_out(&self) -> bool {
        self.signed_volume() < 0.0
    }

    /// Total surface area.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Area of the upward-facing projection onto the XY plane.
    ///
    /// For a closed solid whose top is a heightfield this equals the area of
    /// its planar footprint.
    #[must_use]
    pub fn upward_planar_area(&self) -> f64 {
        self.triangles()
            .map(|tri| tri.planar_signed_area().max(0.0))
            .sum()
    }

    /// Flip all faces by reversing winding order.
    pub fn flip_normals(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
    }

    /// Merge another mesh into this one, offsetting its face indices.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, so vertex counts > 4B are unsupported
    pub fn merge(&mut self, other: &Self) {
        let vertex_offset = self.vertices.len() as u32;

        self.vertices.extend(other.vertices.iter().copied());
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + vertex_offset, f[1] + vertex_offset, f[2] + vertex_offset]),
        );
    }
}

impl MeshTopology for IndexedMesh {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    fn triangle(&self, face_index: usize) -> Option<Triangle> {
        let &[i0, i1, i2] = self.faces.get(face_index)?;
        Some(Triangle::new(
            self.vertices.get(i0 as usize)?.position,
            self.vertices.get(i1 as usize)?.position,
            self.vertices.get(i2 as usize)?.position,
        ))
    }

    fn triangles(&self) -> impl Iterator<Item = Triangle> {
        self.faces.iter().map(|&[i0, i1, i2]| {
            Triangle::new(
                self.vertices[i0 as usize].position,
                self.vertices[i1 as usize].position,
                self.vertices[i2 as usize].position,
            )
        })
    }
}

impl MeshBounds for IndexedMesh {
    fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }
}

/// Build a closed axis-aligned box between two corners.
///
/// Faces are wound CCW from outside.
///
/// # Example
///
/// ```
/// use mesh_types::{axis_box, MeshTopology, Point3};
///
/// let cube = axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// assert_eq!(cube.vertex_count(), 8);
/// assert!((cube.signed_volume() - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn axis_box(a: Point3<f64>, b: Point3<f64>) -> IndexedMesh {
    let bb = Aabb::new(a, b);
    let (lo, hi) = (bb.min, bb.max);
    let mut mesh = IndexedMesh::with_capacity(8, 12);

    for z in [lo.z, hi.z] {
        mesh.vertices.push(Vertex::from_coords(lo.x, lo.y, z));
        mesh.vertices.push(Vertex::from_coords(hi.x, lo.y, z));
        mesh.vertices.push(Vertex::from_coords(hi.x, hi.y, z));
        mesh.vertices.push(Vertex::from_coords(lo.x, hi.y, z));
    }

    mesh.faces.extend_from_slice(&[
        // bottom
        [0, 2, 1],
        [0, 3, 2],
        // top
        [4, 5, 6],
        [4, 6, 7],
        // -Y
        [0, 1, 5],
        [0, 5, 4],
        // +Y
        [3, 7, 6],
        [3, 6, 2],
        // -X
        [0, 4, 7],
        [0, 7, 3],
        // +X
        [1, 2, 6],
        [1, 6, 5],
    ]);

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> IndexedMesh {
        axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn mesh_is_empty() {
        let mesh = IndexedMesh::new();
        assert!(mesh.is_empty());

        let mut mesh2 = IndexedMesh::new();
        mesh2.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        assert!(mesh2.is_empty()); // no faces
    }

    #[test]
    fn box_volume_and_area() {
        let slab = axis_box(Point3::new(0.0, 0.0, 0.005), Point3::new(1.0, 1.0, 0.025));
        let vol = slab.signed_volume();
        assert!((vol - 0.02).abs() < 1e-12, "slab volume should be 0.02, got {vol}");
        let area = slab.upward_planar_area();
        assert!((area - 1.0).abs() < 1e-12, "footprint should be 1.0, got {area}");
    }

    #[test]
    fn unit_cube_surface_area() {
        approx::assert_relative_eq!(unit_cube().surface_area(), 6.0, epsilon = 1e-10);
    }

    #[test]
    fn flipped_cube_inside_out() {
        let mut cube = unit_cube();
        assert!(!cube.is_inside_out());
        cube.flip_normals();
        assert!(cube.is_inside_out());
        assert!((cube.volume() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn mesh_merge() {
        let mut a = unit_cube();
        let mut b = unit_cube();
        b.translate(Vector3::new(2.0, 0.0, 0.0));
        a.merge(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.face_count(), 24);
        assert_eq!(a.faces[12], [8, 10, 9]);
        assert!((a.signed_volume() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn translate_moves_bounds() {
        let mut cube = unit_cube();
        cube.translate(Vector3::new(1.0, 2.0, 3.0));
        let b = cube.bounds();
        assert!((b.min.x - 1.0).abs() < f64::EPSILON);
        assert!((b.min.y - 2.0).abs() < f64::EPSILON);
        assert!((b.max.z - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn triangle_out_of_range_is_none() {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        assert!(mesh.triangle(0).is_none());
        assert!(mesh.triangle(5).is_none());
    }
}
