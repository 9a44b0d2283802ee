//! Planar (XY) geometry shared by the cutter, the solidifier and the carver.
//!
//! Splitting is done against infinite vertical planes, written as lines in
//! the XY plane. Intersection points are computed from canonically ordered
//! segment end points, so two faces that share an edge get bit-identical
//! split points.

use std::cmp::Ordering;

use mesh_types::{IndexedMesh, Point2, Point3, Rect, Vector2, Vector3};
use smallvec::SmallVec;

/// Distance under which a point counts as lying on a line or outline.
pub const ON_LINE: f64 = 1e-10;

/// Convex polygon piece of a face.
pub type Piece = SmallVec<[Point3<f64>; 8]>;

/// Position of a point relative to a closed polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Strictly inside.
    Inside,
    /// On an edge, within [`ON_LINE`].
    Boundary,
    /// Strictly outside.
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Snap {
    X(f64),
    Y(f64),
    Free,
}

/// Vertical cutting plane `normal · (x, y) = offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    normal: Vector2<f64>,
    offset: f64,
    snap: Snap,
}

impl Line {
    /// Plane `x = c`.
    #[must_use]
    pub fn vertical(c: f64) -> Self {
        Self {
            normal: Vector2::new(1.0, 0.0),
            offset: c,
            snap: Snap::X(c),
        }
    }

    /// Plane `y = c`.
    #[must_use]
    pub fn horizontal(c: f64) -> Self {
        Self {
            normal: Vector2::new(0.0, 1.0),
            offset: c,
            snap: Snap::Y(c),
        }
    }

    /// Line through two distinct points, independent of their order.
    #[must_use]
    pub fn through(a: Point2<f64>, b: Point2<f64>) -> Option<Self> {
        let (a, b) = if cmp_planar(&a, &b) == Ordering::Greater {
            (b, a)
        } else {
            (a, b)
        };
        let d = b - a;
        if d.x == 0.0 && d.y == 0.0 {
            None
        } else if d.x == 0.0 {
            Some(Self::vertical(a.x))
        } else if d.y == 0.0 {
            Some(Self::horizontal(a.y))
        } else {
            let normal = Vector2::new(-d.y, d.x).normalize();
            Some(Self {
                normal,
                offset: normal.dot(&a.coords),
                snap: Snap::Free,
            })
        }
    }

    /// Signed distance of `p` (its XY part) from the plane.
    #[inline]
    #[must_use]
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        match self.snap {
            Snap::X(c) => p.x - c,
            Snap::Y(c) => p.y - c,
            Snap::Free => self.normal.x.mul_add(p.x, self.normal.y * p.y) - self.offset,
        }
    }

    /// Point where segment `p`-`q` crosses the plane.
    fn intersect(&self, p: &Point3<f64>, q: &Point3<f64>, dp: f64, dq: f64) -> Point3<f64> {
        let (a, b, da, db) = if cmp_points(p, q) == Ordering::Greater {
            (q, p, dq, dp)
        } else {
            (p, q, dp, dq)
        };
        let t = da / (da - db);
        let mut x = a + (b - a) * t;
        match self.snap {
            Snap::X(c) => x.x = c,
            Snap::Y(c) => x.y = c,
            Snap::Free => {}
        }
        x
    }
}

fn cmp_planar(a: &Point2<f64>, b: &Point2<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn cmp_points(a: &Point3<f64>, b: &Point3<f64>) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

/// Split a convex piece by `line` into its front (`d >= 0`) and back
/// (`d <= 0`) parts. A piece that does not cross the line is returned whole
/// on its side.
#[must_use]
pub fn split_piece(piece: &[Point3<f64>], line: &Line) -> (Option<Piece>, Option<Piece>) {
    let d: SmallVec<[f64; 8]> = piece.iter().map(|p| line.distance(p)).collect();
    let min = d.iter().copied().fold(f64::INFINITY, f64::min);
    let max = d.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min >= 0.0 {
        return (Some(Piece::from_slice(piece)), None);
    }
    if max <= 0.0 {
        return (None, Some(Piece::from_slice(piece)));
    }

    let mut front = Piece::new();
    let mut back = Piece::new();
    for i in 0..piece.len() {
        let j = (i + 1) % piece.len();
        let (p, dp, dq) = (&piece[i], d[i], d[j]);
        if dp >= 0.0 {
            front.push(*p);
        }
        if dp <= 0.0 {
            back.push(*p);
        }
        if (dp > 0.0 && dq < 0.0) || (dp < 0.0 && dq > 0.0) {
            let x = line.intersect(p, &piece[j], dp, dq);
            front.push(x);
            back.push(x);
        }
    }
    let keep = |piece: Piece| (piece.len() >= 3).then_some(piece);
    (keep(front), keep(back))
}

/// Clip a convex piece to an axis-aligned rectangle.
#[must_use]
pub fn clip_to_rect(piece: &[Point3<f64>], rect: &Rect) -> Option<Piece> {
    let (keep, _) = split_piece(piece, &Line::vertical(rect.min.x));
    let (_, keep) = split_piece(&keep?, &Line::vertical(rect.max.x));
    let (keep, _) = split_piece(&keep?, &Line::horizontal(rect.min.y));
    let (_, keep) = split_piece(&keep?, &Line::horizontal(rect.max.y));
    keep
}

/// Lowest point of the part of `mesh` that lies over `rect`.
///
/// Each face overlapping the rectangle is clipped to it exactly, so a face
/// that only grazes the rectangle contributes only its grazing part.
#[must_use]
pub fn min_z_over(mesh: &IndexedMesh, rect: &Rect) -> Option<f64> {
    mesh.faces
        .iter()
        .filter_map(|&[a, b, c]| {
            let tri = [mesh.position(a), mesh.position(b), mesh.position(c)];
            if !overlaps(&planar_bounds(&tri), rect) {
                return None;
            }
            clip_to_rect(&tri, rect)
                .map(|piece| piece.iter().map(|p| p.z).fold(f64::INFINITY, f64::min))
        })
        .reduce(f64::min)
}

/// Planar bounding rectangle of some points.
#[must_use]
pub fn planar_bounds(points: &[Point3<f64>]) -> Rect {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Rect { min, max }
}

/// Closed-interval overlap test, true for rectangles that only touch.
#[must_use]
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.min.x <= b.max.x && b.min.x <= a.max.x && a.min.y <= b.max.y && b.min.y <= a.max.y
}

/// Twice the signed area of triangle `a b c` (positive when counter-clockwise).
#[inline]
#[must_use]
pub fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)))
}

/// Signed area of a closed polygon (positive when counter-clockwise).
#[must_use]
pub fn signed_area(polygon: &[Point2<f64>]) -> f64 {
    let n = polygon.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (p, q) = (&polygon[i], &polygon[(i + 1) % n]);
            p.x.mul_add(q.y, -(q.x * p.y))
        })
        .sum();
    twice / 2.0
}

/// Distance from `p` to segment `a`-`b`.
#[must_use]
pub fn segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Smallest distance from `p` to the edges of a closed polygon.
#[must_use]
pub fn boundary_distance(polygon: &[Point2<f64>], p: &Point2<f64>) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| segment_distance(p, &polygon[i], &polygon[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

/// Locate `p` relative to a closed polygon of either orientation.
#[must_use]
pub fn classify(polygon: &[Point2<f64>], p: &Point2<f64>) -> Side {
    if boundary_distance(polygon, p) <= ON_LINE {
        return Side::Boundary;
    }
    if crossings(polygon, p) % 2 == 1 {
        Side::Inside
    } else {
        Side::Outside
    }
}

/// Number of polygon edges crossed by the ray from `p` towards +X.
#[must_use]
pub fn crossings(polygon: &[Point2<f64>], p: &Point2<f64>) -> usize {
    let n = polygon.len();
    (0..n)
        .filter(|&i| {
            let (a, b) = (&polygon[i], &polygon[(i + 1) % n]);
            if (a.y > p.y) == (b.y > p.y) {
                return false;
            }
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            p.x < x
        })
        .count()
}

/// Twice the area of a planar polygon, measured along `normal`.
#[must_use]
pub fn twice_area(points: &[Point3<f64>], normal: &Vector3<f64>) -> f64 {
    (1..points.len().saturating_sub(1))
        .map(|i| (points[i] - points[0]).cross(&(points[i + 1] - points[0])).dot(normal))
        .sum()
}

/// Triangulate a convex planar piece without creating slivers.
///
/// Collinear points stay as vertices of the result (neighbouring pieces rely
/// on them), but every emitted triangle has non-zero area. Consecutive points
/// closer than a small fraction of the piece size are merged first, and once
/// no clean ear is left the rest is fanned, so the triangles always cover the
/// piece. Returned indices refer to `piece` and keep the winding of `normal`.
#[must_use]
pub fn triangulate_convex(piece: &[Point3<f64>], normal: &Vector3<f64>) -> SmallVec<[[usize; 3]; 8]> {
    let mut out = SmallVec::new();
    let n = piece.len();
    if n < 3 {
        return out;
    }
    let scale = piece
        .iter()
        .map(|p| (p - piece[0]).norm_squared())
        .fold(0.0, f64::max);
    let tol = 1e-18_f64.max(scale * 1e-14);
    let merge = scale * 1e-20;
    let ear_area = |a: usize, b: usize, c: usize| (piece[b] - piece[a]).cross(&(piece[c] - piece[b])).dot(normal);

    let mut ring: SmallVec<[usize; 8]> = SmallVec::new();
    for i in 0..n {
        match ring.last() {
            Some(&last) if (piece[i] - piece[last]).norm_squared() <= merge => {}
            _ => ring.push(i),
        }
    }
    while ring.len() > 1 && (piece[ring[ring.len() - 1]] - piece[ring[0]]).norm_squared() <= merge {
        ring.pop();
    }
    if ring.len() < 3 {
        return out;
    }

    let mut remaining: f64 = (1..ring.len() - 1).map(|i| ear_area(ring[0], ring[i], ring[i + 1])).sum();
    while ring.len() > 3 {
        let m = ring.len();
        let found = (0..m).find_map(|k| {
            let (a, b, c) = (ring[(k + m - 1) % m], ring[k], ring[(k + 1) % m]);
            let area = ear_area(a, b, c);
            (area > tol && remaining - area > tol).then_some((k, area))
        });
        let Some((k, area)) = found else {
            break;
        };
        out.push([ring[(k + m - 1) % m], ring[k], ring[(k + 1) % m]]);
        ring.remove(k);
        remaining -= area;
    }
    for i in 1..ring.len() - 1 {
        if ear_area(ring[0], ring[i], ring[i + 1]) > tol {
            out.push([ring[0], ring[i], ring[i + 1]]);
        }
    }
    out
}

/// Triangulate a polygon with holes by ear clipping.
///
/// `outer` must be counter-clockwise and every hole clockwise. Indices refer
/// to `points`; the returned triangles are counter-clockwise. Holes are
/// bridged to the outer ring in order of decreasing maximum X. Returns `None`
/// if the polygon cannot be triangulated.
#[must_use]
pub fn triangulate_polygon(
    points: &[Point2<f64>],
    outer: &[u32],
    holes: &[Vec<u32>],
) -> Option<Vec<[u32; 3]>> {
    let at = |i: u32| points[i as usize];
    let mut order: Vec<(usize, usize)> = holes
        .iter()
        .enumerate()
        .filter(|(_, hole)| hole.len() >= 3)
        .map(|(k, hole)| {
            let start = (0..hole.len())
                .max_by(|&i, &j| {
                    at(hole[i])
                        .x
                        .total_cmp(&at(hole[j]).x)
                        .then(at(hole[j]).y.total_cmp(&at(hole[i]).y))
                })
                .unwrap_or(0);
            (k, start)
        })
        .collect();
    order.sort_by(|&(ka, sa), &(kb, sb)| {
        at(holes[kb][sb])
            .x
            .total_cmp(&at(holes[ka][sa]).x)
            .then(ka.cmp(&kb))
    });

    let mut ring = outer.to_vec();
    for (k, start) in order {
        let hole = &holes[k];
        let h = hole[start];
        let bridge = find_bridge(points, &ring, holes, h)?;
        let mut spliced = Vec::with_capacity(ring.len() + hole.len() + 2);
        spliced.extend_from_slice(&ring[..=bridge]);
        spliced.extend((0..=hole.len()).map(|j| hole[(start + j) % hole.len()]));
        spliced.push(ring[bridge]);
        spliced.extend_from_slice(&ring[bridge + 1..]);
        ring = spliced;
    }

    ear_clip(points, &ring)
}

/// Position in `ring` of the closest vertex that can see hole vertex `h`.
fn find_bridge(points: &[Point2<f64>], ring: &[u32], holes: &[Vec<u32>], h: u32) -> Option<usize> {
    let hp = points[h as usize];
    let n = ring.len();
    let mut candidates: Vec<(f64, usize)> = (0..n)
        .map(|i| ((points[ring[i] as usize] - hp).norm_squared(), i))
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    candidates.into_iter().map(|(_, i)| i).find(|&i| {
        let c = points[ring[i] as usize];
        let prev = points[ring[(i + n - 1) % n] as usize];
        let next = points[ring[(i + 1) % n] as usize];
        c != hp
            && locally_inside(&prev, &c, &next, &hp)
            && !blocked(points, ring, &c, &hp)
            && holes.iter().all(|hole| !blocked(points, hole, &c, &hp))
    })
}

/// Whether direction `c -> target` leaves `c` into the polygon interior.
fn locally_inside(prev: &Point2<f64>, c: &Point2<f64>, next: &Point2<f64>, target: &Point2<f64>) -> bool {
    let d = target - c;
    let out = next - c;
    let back = prev - c;
    let cross = |u: &Vector2<f64>, v: &Vector2<f64>| u.x.mul_add(v.y, -(u.y * v.x));
    if orient(prev, c, next) > 0.0 {
        cross(&out, &d) > 0.0 && cross(&d, &back) > 0.0
    } else {
        cross(&out, &d) > 0.0 || cross(&d, &back) > 0.0
    }
}

/// Whether segment `a`-`b` crosses an edge of `ring` or passes through a vertex.
fn blocked(points: &[Point2<f64>], ring: &[u32], a: &Point2<f64>, b: &Point2<f64>) -> bool {
    let n = ring.len();
    (0..n).any(|i| {
        let p = points[ring[i] as usize];
        let q = points[ring[(i + 1) % n] as usize];
        if p != *a && p != *b && segment_distance(&p, a, b) <= ON_LINE {
            return true;
        }
        if p == *a || p == *b || q == *a || q == *b {
            return false;
        }
        let (o1, o2) = (orient(a, b, &p), orient(a, b, &q));
        let (o3, o4) = (orient(&p, &q, a), orient(&p, &q, b));
        o1 * o2 < 0.0 && o3 * o4 < 0.0
    })
}

fn ear_clip(points: &[Point2<f64>], ring: &[u32]) -> Option<Vec<[u32; 3]>> {
    let n = ring.len();
    if n < 3 {
        return None;
    }
    let at = |k: usize| points[ring[k] as usize];
    let mut prev: Vec<usize> = (0..n).map(|i| (i + n - 1) % n).collect();
    let mut next: Vec<usize> = (0..n).map(|i| (i + 1) % n).collect();
    let mut triangles = Vec::with_capacity(n - 2);
    let mut remaining = n;
    let mut cur = 0;
    let mut misses = 0;
    let mut relaxed = false;

    while remaining > 3 {
        let (a, b, c) = (prev[cur], cur, next[cur]);
        if is_ear(points, ring, &next, a, b, c, relaxed) {
            triangles.push([ring[a], ring[b], ring[c]]);
            next[a] = c;
            prev[c] = a;
            remaining -= 1;
            cur = a;
            misses = 0;
            relaxed = false;
            continue;
        }
        cur = next[cur];
        misses += 1;
        if misses > remaining {
            if relaxed {
                return None;
            }
            relaxed = true;
            misses = 0;
        }
    }

    let (a, c) = (prev[cur], next[cur]);
    if orient(&at(a), &at(cur), &at(c)) <= 0.0 {
        return None;
    }
    triangles.push([ring[a], ring[cur], ring[c]]);
    Some(triangles)
}

fn is_ear(
    points: &[Point2<f64>],
    ring: &[u32],
    next: &[usize],
    a: usize,
    b: usize,
    c: usize,
    relaxed: bool,
) -> bool {
    let (pa, pb, pc) = (
        points[ring[a] as usize],
        points[ring[b] as usize],
        points[ring[c] as usize],
    );
    let ab = (pb - pa).norm();
    let bc = (pc - pb).norm();
    let ca = (pa - pc).norm();
    // Convex with a non-vanishing turn.
    if orient(&pa, &pb, &pc) <= 1e-9 * ab * bc {
        return false;
    }

    let corners = [ring[a], ring[b], ring[c]];
    let mut k = next[c];
    while k != a {
        if !corners.contains(&ring[k]) {
            let p = points[ring[k] as usize];
            let s1 = orient(&pa, &pb, &p) / ab;
            let s2 = orient(&pb, &pc, &p) / bc;
            let s3 = orient(&pc, &pa, &p) / ca;
            let blocks = if relaxed {
                s1 > ON_LINE && s2 > ON_LINE && s3 > ON_LINE
            } else {
                s1 >= -ON_LINE && s2 >= -ON_LINE && s3 >= -ON_LINE
            };
            if blocks {
                return false;
            }
        }
        k = next[k];
    }
    true
}
