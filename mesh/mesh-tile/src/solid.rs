//! Solid builder: closes a surface patch into a printable tile.
//!
//! The patch is kept as the top. Every rim is dropped to the anchor plane
//! by a vertical wall, and the rims projected onto the anchor plane form
//! the flat bottom. Cavity shells open into the bottom as extra holes.
//!
//! Rim vertices sharing a planar position (where the rim climbs a wall of
//! the surface) form a run and share one bottom vertex, so the walls never
//! contain zero-width panels.

use mesh_repair::check_closed_manifold;
use mesh_types::{IndexedMesh, Point2, Point3, Vertex};
use tracing::trace;

use crate::cavity::Cavity;
use crate::cut::SurfacePatch;
use crate::error::{BuildError, BuildResult};
use crate::planar::{crossings, signed_area, triangulate_polygon};

/// Bottom ring with its signed planar area.
struct Ring {
    indices: Vec<u32>,
    area: f64,
}

/// Close `patch` into a solid standing on `z = anchor_z`, with `cavities`
/// carved from its bottom.
///
/// # Errors
///
/// - [`BuildError::DegenerateRim`] for a rim without planar extent or one
///   that doubles back vertically
/// - [`BuildError::Triangulation`] if the bottom cannot be triangulated
/// - [`BuildError::NotClosed`] or [`BuildError::NonPositiveVolume`] if the
///   result fails validation
#[allow(clippy::cast_possible_truncation)]
pub fn build_solid(patch: &SurfacePatch, cavities: &[Cavity], anchor_z: f64) -> BuildResult<IndexedMesh> {
    let mut mesh = patch.mesh.clone();
    let mut outers: Vec<Ring> = Vec::new();
    let mut holes: Vec<Ring> = Vec::new();

    for rim in &patch.rims {
        let bottom = add_walls(&mut mesh, rim, anchor_z)?;
        let polygon: Vec<Point2<f64>> = bottom.iter().map(|&v| mesh.vertices[v as usize].planar()).collect();
        let area = signed_area(&polygon);
        let ring = Ring { indices: bottom, area };
        if area > 0.0 {
            outers.push(ring);
        } else if area < 0.0 {
            holes.push(ring);
        } else {
            return Err(BuildError::DegenerateRim {
                reason: "rim encloses no area".to_string(),
            });
        }
    }

    for cavity in cavities {
        let shell = cavity.shell(anchor_z);
        let offset = mesh.vertices.len() as u32;
        mesh.vertices.extend_from_slice(&shell.vertices);
        mesh.faces.extend(shell.faces.iter().map(|f| f.map(|v| v + offset)));
        let indices: Vec<u32> = shell.mouth.iter().rev().map(|&v| v + offset).collect();
        let polygon: Vec<Point2<f64>> = indices.iter().map(|&v| mesh.vertices[v as usize].planar()).collect();
        holes.push(Ring {
            area: signed_area(&polygon),
            indices,
        });
    }

    let points: Vec<Point2<f64>> = mesh.vertices.iter().map(Vertex::planar).collect();
    let outer_polygons: Vec<Vec<Point2<f64>>> = outers
        .iter()
        .map(|ring| ring.indices.iter().map(|&v| points[v as usize]).collect())
        .collect();
    let mut assigned: Vec<Vec<Vec<u32>>> = vec![Vec::new(); outers.len()];
    for hole in holes {
        let first = points[hole.indices[0] as usize];
        let owner = (0..outers.len())
            .filter(|&k| crossings(&outer_polygons[k], &first) % 2 == 1)
            .min_by(|&a, &b| outers[a].area.total_cmp(&outers[b].area))
            .ok_or_else(|| BuildError::Triangulation {
                reason: format!("hole of area {:.3e} lies outside every outer rim", -hole.area),
            })?;
        assigned[owner].push(hole.indices);
    }

    for (ring, ring_holes) in outers.iter().zip(&assigned) {
        let triangles = triangulate_polygon(&points, &ring.indices, ring_holes).ok_or_else(|| {
            BuildError::Triangulation {
                reason: format!(
                    "bottom ring of {} vertices with {} holes",
                    ring.indices.len(),
                    ring_holes.len()
                ),
            }
        })?;
        // The bottom faces down.
        mesh.faces.extend(triangles.into_iter().map(|[a, b, c]| [a, c, b]));
    }

    check_closed_manifold(&mesh).map_err(|e| BuildError::NotClosed {
        details: e.to_string(),
    })?;
    let volume = mesh.signed_volume();
    if volume <= 0.0 {
        return Err(BuildError::NonPositiveVolume { volume });
    }
    trace!(
        "Built solid: {} faces, {} cavities, volume {volume:.6}",
        mesh.faces.len(),
        cavities.len()
    );
    Ok(mesh)
}

/// Add the vertical wall under `rim` and return its bottom ring.
fn add_walls(mesh: &mut IndexedMesh, rim: &[u32], anchor_z: f64) -> BuildResult<Vec<u32>> {
    let runs = split_runs(mesh, rim)?;
    let bottom: Vec<u32> = runs
        .iter()
        .map(|run| {
            let p = mesh.vertices[run[0] as usize].planar();
            mesh.push_vertex(Vertex::new(Point3::new(p.x, p.y, anchor_z)))
        })
        .collect();

    let z = |v: u32| mesh.vertices[v as usize].z();
    let n = runs.len();
    let mut faces = Vec::new();
    for j in 0..n {
        let next = (j + 1) % n;
        let (run, run_next) = (&runs[j], &runs[next]);
        let u = run[run.len() - 1];
        let v = run_next[0];
        let left = column(bottom[j], run, u, z);
        let right = column(bottom[next], run_next, v, z);
        zip_panel(&left, &right, z, &mut faces);
    }
    mesh.faces.extend(faces);
    Ok(bottom)
}

/// Split `rim` into maximal runs of vertices at the same planar position.
fn split_runs(mesh: &IndexedMesh, rim: &[u32]) -> BuildResult<Vec<Vec<u32>>> {
    let xy = |v: u32| mesh.vertices[v as usize].planar();
    let n = rim.len();
    let Some(start) = (0..n).find(|&i| xy(rim[(i + n - 1) % n]) != xy(rim[i])) else {
        return Err(BuildError::DegenerateRim {
            reason: format!("all {n} rim vertices share one planar position"),
        });
    };

    let mut runs: Vec<Vec<u32>> = Vec::new();
    for k in 0..n {
        let v = rim[(start + k) % n];
        match runs.last_mut() {
            Some(run) if xy(run[0]) == xy(v) => run.push(v),
            _ => runs.push(vec![v]),
        }
    }
    if runs.len() < 3 {
        return Err(BuildError::DegenerateRim {
            reason: format!("rim has only {} distinct planar positions", runs.len()),
        });
    }

    let z = |v: u32| mesh.vertices[v as usize].z();
    for run in runs.iter().filter(|run| run.len() > 2) {
        let rising = z(run[1]) > z(run[0]);
        let monotone = run
            .windows(2)
            .all(|w| if rising { z(w[1]) > z(w[0]) } else { z(w[1]) < z(w[0]) });
        if !monotone {
            return Err(BuildError::DegenerateRim {
                reason: format!("rim doubles back vertically at vertex {}", run[0]),
            });
        }
    }
    Ok(runs)
}

/// Bottom vertex, then the run's vertices below `top` from low to high, then `top`.
fn column(bottom: u32, run: &[u32], top: u32, z: impl Fn(u32) -> f64) -> Vec<u32> {
    let mut below: Vec<u32> = run.iter().copied().filter(|&w| z(w) < z(top)).collect();
    below.sort_by(|&a, &b| z(a).total_cmp(&z(b)));
    let mut column = Vec::with_capacity(below.len() + 2);
    column.push(bottom);
    column.extend(below);
    column.push(top);
    column
}

/// Triangulate the panel between two columns, merging them by height.
///
/// `left` precedes `right` along the rim, and the panel faces away from the
/// rim's left side.
fn zip_panel(left: &[u32], right: &[u32], z: impl Fn(u32) -> f64, faces: &mut Vec<[u32; 3]>) {
    let (nl, nr) = (left.len(), right.len());
    let (mut i, mut k) = (0, 0);
    while i < nl - 1 || k < nr - 1 {
        if k == nr - 1 || (i < nl - 1 && z(left[i + 1]) <= z(right[k + 1])) {
            faces.push([right[k], left[i + 1], left[i]]);
            i += 1;
        } else {
            faces.push([right[k + 1], left[i], right[k]]);
            k += 1;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::HoleConfig;
    use crate::cut::cut_patch;
    use crate::outline::Outline;
    use crate::surface::{extract_sheet, tests::step_block};
    use approx::assert_relative_eq;
    use mesh_types::Rect;

    fn flat_patch(z: f64) -> SurfacePatch {
        let mut mesh = IndexedMesh::new();
        for (x, y) in [(0.0, 0.0), (0.2, 0.0), (0.2, 0.2), (0.0, 0.2)] {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([0, 2, 3]);
        SurfacePatch {
            mesh,
            rims: vec![vec![0, 1, 2, 3]],
        }
    }

    fn step_patch(x0: f64, x1: f64) -> SurfacePatch {
        let (sheet, _) = extract_sheet(&step_block()).unwrap();
        let outline = Outline::rect(Rect::new(Point2::new(x0, 0.0), Point2::new(x1, 1.0)));
        cut_patch(&sheet, &outline).unwrap()
    }

    #[test]
    fn flat_patch_becomes_a_box() {
        let solid = build_solid(&flat_patch(0.05), &[], 0.0).unwrap();
        assert_relative_eq!(solid.volume(), 0.2 * 0.2 * 0.05, epsilon = 1e-15);
        assert!(solid.vertices.iter().all(|v| v.z() == 0.0 || v.z() == 0.05));
        assert_eq!(solid.faces.len(), 2 + 8 + 2);
    }

    #[test]
    fn anchor_sets_the_bottom() {
        let solid = build_solid(&flat_patch(0.05), &[], 0.01).unwrap();
        assert_relative_eq!(solid.volume(), 0.2 * 0.2 * 0.04, epsilon = 1e-15);
        let bottom = solid.vertices.iter().map(Vertex::z).fold(f64::INFINITY, f64::min);
        assert_eq!(bottom, 0.01);
    }

    #[test]
    fn step_wall_is_closed_by_runs() {
        let solid = build_solid(&step_patch(0.0, 2.0), &[], 0.0).unwrap();
        assert_relative_eq!(solid.volume(), 3.0, epsilon = 1e-12);

        let solid = build_solid(&step_patch(0.5, 1.5), &[], 0.0).unwrap();
        assert_relative_eq!(solid.volume(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn cavity_removes_its_volume() {
        let patch = flat_patch(0.02);
        let cavity = Cavity::from_config(Point2::new(0.1, 0.1), &HoleConfig::default());
        let plain = build_solid(&patch, &[], 0.0).unwrap().volume();
        let carved = build_solid(&patch, &[cavity], 0.0).unwrap();
        let removed = plain - carved.volume();
        let r = cavity.polygon_radius();
        assert!(removed > 0.0);
        assert!(removed < std::f64::consts::PI * r * r * cavity.height());
        assert!(removed > 0.9 * std::f64::consts::PI * 0.005 * 0.005 * 0.002);
    }

    #[test]
    fn cavity_outside_the_rims_fails() {
        let cavity = Cavity::from_config(Point2::new(0.5, 0.5), &HoleConfig::default());
        assert!(matches!(
            build_solid(&flat_patch(0.02), &[cavity], 0.0),
            Err(BuildError::Triangulation { .. })
        ));
    }

    #[test]
    fn collapsed_rim_is_degenerate() {
        let mut patch = flat_patch(0.02);
        patch.rims = vec![vec![0, 1]];
        assert!(matches!(
            build_solid(&patch, &[], 0.0),
            Err(BuildError::DegenerateRim { .. })
        ));
    }

    #[test]
    fn zipper_merges_columns_by_height() {
        let heights = [0.0, 0.0, 1.0, 3.0, 2.0];
        let mut faces = Vec::new();
        zip_panel(&[0, 2, 3], &[1, 4], |v| heights[v as usize], &mut faces);
        assert_eq!(faces, vec![[1, 2, 0], [4, 2, 1], [4, 3, 2]]);
    }
}
