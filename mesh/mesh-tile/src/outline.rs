//! Tile outlines: the footprint rectangle with a profile on each edge.
//!
//! A straight edge follows the footprint. A dovetail edge replaces the
//! middle of the footprint edge with four points forming a tab (outside the
//! footprint) or a notch (inside it).

use mesh_types::{Point2, Rect};

use crate::grid::{Cell, Edge};
use crate::planar::{self, Line, Side};

/// Shape of one tile edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeProfile {
    /// Flush with the footprint.
    Straight,
    /// Dovetail points in the edge's counter-clockwise traversal order.
    Dovetail([Point2<f64>; 4]),
}

/// Closed planar boundary of a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    footprint: Rect,
    profiles: [EdgeProfile; 4],
}

const fn slot(edge: Edge) -> usize {
    match edge {
        Edge::South => 0,
        Edge::East => 1,
        Edge::North => 2,
        Edge::West => 3,
    }
}

impl Outline {
    /// Plain rectangle.
    #[must_use]
    pub const fn rect(footprint: Rect) -> Self {
        Self {
            footprint,
            profiles: [EdgeProfile::Straight; 4],
        }
    }

    /// Footprint the outline is built on.
    #[must_use]
    pub const fn footprint(&self) -> &Rect {
        &self.footprint
    }

    /// Profile of `edge`.
    #[must_use]
    pub const fn profile(&self, edge: Edge) -> &EdgeProfile {
        &self.profiles[slot(edge)]
    }

    /// Copy of the outline with `edge` replaced.
    #[must_use]
    pub fn with_profile(&self, edge: Edge, profile: EdgeProfile) -> Self {
        let mut next = self.clone();
        next.profiles[slot(edge)] = profile;
        next
    }

    /// Counter-clockwise polygon starting at the south-west corner.
    #[must_use]
    pub fn polygon(&self) -> Vec<Point2<f64>> {
        let corners = self.footprint.corners();
        let mut points = Vec::with_capacity(20);
        for (k, edge) in Edge::CCW.into_iter().enumerate() {
            points.push(corners[k]);
            if let EdgeProfile::Dovetail(dovetail) = self.profile(edge) {
                points.extend_from_slice(dovetail);
            }
        }
        points
    }

    /// Bounding rectangle of the polygon.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let polygon = self.polygon();
        let mut bounds = self.footprint;
        for p in &polygon {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        bounds
    }

    /// Distinct lines carrying the polygon edges.
    #[must_use]
    pub fn lines(&self) -> Vec<Line> {
        let polygon = self.polygon();
        let n = polygon.len();
        let mut lines: Vec<Line> = Vec::with_capacity(n);
        for i in 0..n {
            let Some(line) = Line::through(polygon[i], polygon[(i + 1) % n]) else {
                continue;
            };
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines
    }

    /// Locate `p` relative to the outline.
    #[must_use]
    pub fn classify(&self, p: &Point2<f64>) -> Side {
        planar::classify(&self.polygon(), p)
    }

    /// Area enclosed by the outline.
    #[must_use]
    pub fn area(&self) -> f64 {
        planar::signed_area(&self.polygon())
    }
}

/// Dovetail points for `edge` of `cell`.
///
/// The neck sits on the edge and the flare `depth` away from it, towards
/// the female cell. Both partners of a shared edge get the same four points,
/// each in its own traversal order.
#[must_use]
pub fn dovetail(cell: &Cell, edge: Edge, neck: f64, flare: f64, depth: f64, male: bool) -> [Point2<f64>; 4] {
    let (start, end) = cell.edge_segment(edge);
    let outward = match edge {
        Edge::North | Edge::East => 1.0,
        Edge::South | Edge::West => -1.0,
    };
    let toward_female = if male { outward } else { -outward };
    let along = |p: &Point2<f64>| match edge {
        Edge::North | Edge::South => p.x,
        Edge::East | Edge::West => p.y,
    };
    let coord = match edge {
        Edge::North | Edge::South => start.y,
        Edge::East | Edge::West => start.x,
    };
    let (lo, hi) = (along(&start).min(along(&end)), along(&start).max(along(&end)));
    let mid = (lo + hi) / 2.0;
    let tip = coord + depth * toward_female;
    let at = |a: f64, c: f64| match edge {
        Edge::North | Edge::South => Point2::new(a, c),
        Edge::East | Edge::West => Point2::new(c, a),
    };
    let mut points = [
        at(mid - neck / 2.0, coord),
        at(mid - flare / 2.0, tip),
        at(mid + flare / 2.0, tip),
        at(mid + neck / 2.0, coord),
    ];
    if along(&start) > along(&end) {
        points.reverse();
    }
    points
}
