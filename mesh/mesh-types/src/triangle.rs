//! Triangle type for geometric calculations.

use nalgebra::{Point3, Vector3};

/// A triangle with concrete vertex positions.
///
/// Winding is **counter-clockwise (CCW) when viewed from the front**
/// (normal points toward viewer).
///
/// # Example
///
/// ```
/// use mesh_types::{Triangle, Point3};
///
/// let tri = Triangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// );
///
/// assert!((tri.area() - 0.5).abs() < 1e-10);
/// assert!((tri.planar_signed_area() - 0.5).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub v0: Point3<f64>,
    /// Second vertex.
    pub v1: Point3<f64>,
    /// Third vertex.
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unnormalized face normal. Its magnitude is twice the area.
    #[inline]
    #[must_use]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit face normal, or `None` for a degenerate triangle.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len = n.norm();
        if len > f64::EPSILON * 10.0 {
            Some(n / len)
        } else {
            None
        }
    }

    /// Area of the triangle.
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Signed area of the projection onto the XY plane.
    ///
    /// Positive when the triangle faces up, zero for vertical triangles.
    #[inline]
    #[must_use]
    pub fn planar_signed_area(&self) -> f64 {
        let a = self.v1 - self.v0;
        let b = self.v2 - self.v0;
        a.x.mul_add(b.y, -(a.y * b.x)) * 0.5
    }

    /// Centroid of the triangle.
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Lowest vertex height.
    #[inline]
    #[must_use]
    pub fn min_z(&self) -> f64 {
        self.v0.z.min(self.v1.z).min(self.v2.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_has_no_normal() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(tri.normal().is_none());
        assert!(tri.area() < 1e-15);
    }

    #[test]
    fn vertical_triangle_has_no_planar_area() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
        );
        assert!(tri.planar_signed_area().abs() < 1e-15);
        assert!((tri.area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn clockwise_triangle_has_negative_planar_area() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!((tri.planar_signed_area() + 2.0).abs() < 1e-12);
        let n = tri.normal().map_or(0.0, |n| n.z);
        assert!((n + 1.0).abs() < 1e-12);
    }

    #[test]
    fn centroid_and_min_z() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 3.0),
            Point3::new(3.0, 0.0, 1.0),
            Point3::new(0.0, 3.0, 2.0),
        );
        let c = tri.centroid();
        assert!((c.x - 1.0).abs() < 1e-12);
        assert!((c.z - 2.0).abs() < 1e-12);
        assert!((tri.min_z() - 1.0).abs() < f64::EPSILON);
    }
}
