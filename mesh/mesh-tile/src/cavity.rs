//! Magnet cavity shells.
//!
//! A cavity is a polygonal cylinder opening at the anchor plane, topped by a
//! countersink: a flat shoulder, a frustum narrowing at the countersink half
//! angle, and a small flat cap. The polygon circumscribes the nominal
//! radius, so a magnet of that radius always fits.

use std::f64::consts::TAU;

use mesh_types::{Point2, Point3, Rect, Vertex};

use crate::config::HoleConfig;

/// Shoulders narrower than this are left out.
const MIN_SHOULDER: f64 = 1e-9;

/// A magnet cavity at a planar position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cavity {
    /// Axis position.
    pub center: Point2<f64>,
    /// Nominal shaft radius.
    pub radius: f64,
    /// Shaft depth above the anchor plane.
    pub depth: f64,
    /// Radial width of the shoulder.
    pub shoulder: f64,
    /// Radius of the flat cap.
    pub tip_radius: f64,
    /// Countersink half angle in degrees.
    pub half_angle_deg: f64,
    /// Polygon segment count.
    pub segments: usize,
}

/// Vertices and faces of a cavity, ready to be appended to a solid.
#[derive(Debug, Clone, PartialEq)]
pub struct CavityShell {
    /// Shell vertices. The first `segments` are the mouth ring.
    pub vertices: Vec<Vertex>,
    /// Faces with normals pointing into the cavity, indices local to `vertices`.
    pub faces: Vec<[u32; 3]>,
    /// Mouth ring, counter-clockwise seen from above.
    pub mouth: Vec<u32>,
}

impl Cavity {
    /// Cavity for `config` centered at `center`.
    #[must_use]
    pub fn from_config(center: Point2<f64>, config: &HoleConfig) -> Self {
        Self {
            center,
            radius: config.shaft_radius,
            depth: config.shaft_depth,
            shoulder: config.countersink.shoulder,
            tip_radius: config.countersink.tip_radius,
            half_angle_deg: config.countersink.half_angle_deg,
            segments: config.segments,
        }
    }

    /// Same cavity at another position.
    #[must_use]
    pub const fn moved_to(&self, center: Point2<f64>) -> Self {
        Self { center, ..*self }
    }

    /// Radius of the polygon's vertices.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn polygon_radius(&self) -> f64 {
        self.radius / (std::f64::consts::PI / self.segments as f64).cos()
    }

    fn frustum_height(&self) -> f64 {
        let base = self.radius - self.shoulder;
        (base - self.tip_radius) / self.half_angle_deg.to_radians().tan()
    }

    /// Height of the cavity's highest point above the anchor plane.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.depth + self.frustum_height()
    }

    /// Planar bounds of the polygon.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let r = self.polygon_radius();
        Rect {
            min: Point2::new(self.center.x - r, self.center.y - r),
            max: Point2::new(self.center.x + r, self.center.y + r),
        }
    }

    /// Build the shell with its mouth on the plane `z = anchor_z`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn shell(&self, anchor_z: f64) -> CavityShell {
        let n = self.segments;
        let scale = self.polygon_radius() / self.radius;
        let shaft_top = anchor_z + self.depth;
        let with_shoulder = self.shoulder > MIN_SHOULDER;
        let base = self.radius - self.shoulder;
        let tip_z = shaft_top + self.frustum_height();

        let mut radii = vec![(self.radius, anchor_z), (self.radius, shaft_top)];
        if with_shoulder {
            radii.push((base, shaft_top));
        }
        radii.push((self.tip_radius, tip_z));

        let mut vertices = Vec::with_capacity(radii.len() * n + 1);
        for &(r, z) in &radii {
            let r = r * scale;
            for i in 0..n {
                let angle = TAU * i as f64 / n as f64;
                vertices.push(Vertex::new(Point3::new(
                    self.center.x + r * angle.cos(),
                    self.center.y + r * angle.sin(),
                    z,
                )));
            }
        }
        let cap = vertices.len() as u32;
        vertices.push(Vertex::new(Point3::new(self.center.x, self.center.y, tip_z)));

        let ring = |k: usize, i: usize| (k * n + i % n) as u32;
        let mut faces = Vec::with_capacity(2 * n * (radii.len() - 1) + n);
        for k in 0..radii.len() - 1 {
            for i in 0..n {
                let (lo, lo_next) = (ring(k, i), ring(k, i + 1));
                let (hi, hi_next) = (ring(k + 1, i), ring(k + 1, i + 1));
                faces.push([lo_next, lo, hi]);
                faces.push([lo_next, hi, hi_next]);
            }
        }
        let top = radii.len() - 1;
        for i in 0..n {
            faces.push([ring(top, i + 1), ring(top, i), cap]);
        }

        CavityShell {
            vertices,
            faces,
            mouth: (0..n).map(|i| ring(0, i)).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::IndexedMesh;
    use std::collections::HashMap;

    fn cavity() -> Cavity {
        Cavity::from_config(Point2::new(0.1, 0.2), &HoleConfig::default())
    }

    #[test]
    fn default_height_is_shaft_plus_countersink() {
        assert_relative_eq!(cavity().height(), 0.0055, epsilon = 1e-12);
        assert_relative_eq!(cavity().height(), HoleConfig::default().cavity_height(), epsilon = 1e-15);
    }

    #[test]
    fn polygon_circumscribes_radius() {
        let c = cavity();
        let shell = c.shell(0.0);
        let apothem = c.polygon_radius() * (std::f64::consts::PI / 32.0).cos();
        assert_relative_eq!(apothem, 0.005, epsilon = 1e-15);
        for &v in &shell.mouth {
            let p = shell.vertices[v as usize].planar();
            assert_relative_eq!((p - c.center).norm(), c.polygon_radius(), epsilon = 1e-12);
        }
    }

    #[test]
    fn shell_edges_pair_up_except_the_mouth() {
        let shell = cavity().shell(0.0);
        let mut directed: HashMap<(u32, u32), u32> = HashMap::new();
        for f in &shell.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *directed.entry((a, b)).or_default() += 1;
            }
        }
        let open: Vec<(u32, u32)> = directed
            .keys()
            .filter(|&&(a, b)| !directed.contains_key(&(b, a)))
            .copied()
            .collect();
        assert_eq!(open.len(), 32);
        assert!(open.iter().all(|&(a, b)| a < 32 && b < 32 && (b + 1) % 32 == a));
        assert!(directed.values().all(|&n| n == 1));
    }

    #[test]
    fn capped_shell_encloses_the_cavity_volume() {
        // Close the mouth with a fan pointing up into the cavity, then the
        // shell seen from inside has negative volume.
        let c = cavity();
        let shell = c.shell(0.0);
        let mut mesh = IndexedMesh::from_parts(shell.vertices.clone(), shell.faces.clone());
        let center = mesh.push_vertex(Vertex::new(Point3::new(c.center.x, c.center.y, 0.0)));
        for i in 0..32 {
            mesh.faces.push([shell.mouth[i], shell.mouth[(i + 1) % 32], center]);
        }
        let volume = -mesh.signed_volume();
        let r = c.polygon_radius();
        let shaft = 0.5 * 32.0 * r * r * (TAU / 32.0).sin() * 0.002;
        assert!(volume > shaft);
        assert!(volume < std::f64::consts::PI * r * r * c.height());
    }

    #[test]
    fn no_shoulder_skips_the_annulus() {
        let mut c = cavity();
        c.shoulder = 0.0;
        let shell = c.shell(0.0);
        assert_eq!(shell.vertices.len(), 3 * 32 + 1);
        assert_eq!(shell.faces.len(), 2 * 2 * 32 + 32);
    }
}
