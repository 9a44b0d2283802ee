//! Hole carver: magnet cavities at the corners and edge midpoints.

use std::fmt;

use mesh_types::{Point2, Rect};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cavity::Cavity;
use crate::config::HoleConfig;
use crate::cut::SurfacePatch;
use crate::error::{BuildError, BuildResult, TileWarning};
use crate::grid::Edge;
use crate::planar::{crossings, min_z_over, segment_distance};
use crate::tile::TileModel;

/// Where a hole sits on its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HoleSite {
    /// Corner at minimum X, minimum Y.
    SouthWest,
    /// Corner at maximum X, minimum Y.
    SouthEast,
    /// Corner at maximum X, maximum Y.
    NorthEast,
    /// Corner at minimum X, maximum Y.
    NorthWest,
    /// Midpoint of an edge.
    Midpoint(Edge),
}

impl HoleSite {
    /// Sites enabled by `config`, corners first.
    #[must_use]
    pub fn enabled(config: &HoleConfig) -> Vec<Self> {
        let mut sites = Vec::with_capacity(8);
        if config.corners {
            sites.extend([Self::SouthWest, Self::SouthEast, Self::NorthEast, Self::NorthWest]);
        }
        if config.edge_midpoints {
            sites.extend(Edge::CCW.map(Self::Midpoint));
        }
        sites
    }

    /// Shaft center for this site, `inset` in from the footprint edges.
    #[must_use]
    pub fn position(self, footprint: &Rect, inset: f64) -> Point2<f64> {
        let (min, max) = (footprint.min, footprint.max);
        let center = footprint.center();
        match self {
            Self::SouthWest => Point2::new(min.x + inset, min.y + inset),
            Self::SouthEast => Point2::new(max.x - inset, min.y + inset),
            Self::NorthEast => Point2::new(max.x - inset, max.y - inset),
            Self::NorthWest => Point2::new(min.x + inset, max.y - inset),
            Self::Midpoint(Edge::South) => Point2::new(center.x, min.y + inset),
            Self::Midpoint(Edge::East) => Point2::new(max.x - inset, center.y),
            Self::Midpoint(Edge::North) => Point2::new(center.x, max.y - inset),
            Self::Midpoint(Edge::West) => Point2::new(min.x + inset, center.y),
        }
    }
}

impl fmt::Display for HoleSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SouthWest => write!(f, "SW corner"),
            Self::SouthEast => write!(f, "SE corner"),
            Self::NorthEast => write!(f, "NE corner"),
            Self::NorthWest => write!(f, "NW corner"),
            Self::Midpoint(edge) => write!(f, "{edge} midpoint"),
        }
    }
}

/// A hole that made it into the solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarvedHole {
    /// Nominal site.
    pub site: HoleSite,
    /// Shaft center.
    pub center: Point2<f64>,
    /// True when the nominal position failed and the hole was moved inward.
    pub relocated: bool,
}

/// Check that a cavity of polygon radius `radius` at `center` lies inside
/// the rims with `min_wall` to spare.
///
/// # Errors
///
/// [`BuildError::OutsideTile`] or [`BuildError::Clearance`].
pub fn check_clearance(
    center: &Point2<f64>,
    radius: f64,
    rims: &[Vec<Point2<f64>>],
    min_wall: f64,
) -> BuildResult<()> {
    let parity: usize = rims.iter().map(|rim| crossings(rim, center)).sum();
    if parity % 2 == 0 {
        return Err(BuildError::OutsideTile);
    }
    let distance = rims
        .iter()
        .flat_map(|rim| {
            let n = rim.len();
            (0..n).map(move |i| segment_distance(center, &rim[i], &rim[(i + 1) % n]))
        })
        .fold(f64::INFINITY, f64::min);
    if distance - radius < min_wall {
        return Err(BuildError::Clearance {
            clearance: distance - radius,
            required: min_wall,
        });
    }
    Ok(())
}

/// Run every placement check for `cavity` against the tile surface and the
/// cavities already carved.
///
/// # Errors
///
/// [`BuildError::OutsideTile`], [`BuildError::Clearance`] or
/// [`BuildError::ThinRoof`].
pub fn check_placement(
    cavity: &Cavity,
    patch: &SurfacePatch,
    others: &[Cavity],
    config: &HoleConfig,
    anchor_z: f64,
) -> BuildResult<()> {
    let radius = cavity.polygon_radius();
    check_clearance(&cavity.center, radius, &patch.rim_polygons(), config.min_wall)?;

    for other in others {
        let gap = (other.center - cavity.center).norm() - radius - other.polygon_radius();
        if gap < config.min_wall {
            return Err(BuildError::Clearance {
                clearance: gap,
                required: config.min_wall,
            });
        }
    }

    let Some(surface) = min_z_over(&patch.mesh, &cavity.bounds()) else {
        return Err(BuildError::OutsideTile);
    };
    let roof = surface - (anchor_z + cavity.height());
    if roof < config.min_roof {
        return Err(BuildError::ThinRoof {
            roof,
            required: config.min_roof,
        });
    }
    Ok(())
}

/// Center moved `offset` towards the footprint center along both axes.
#[must_use]
pub fn inward(center: Point2<f64>, footprint: &Rect, offset: f64) -> Point2<f64> {
    let mid = footprint.center();
    let toward = |from: f64, to: f64| {
        if from < to {
            offset
        } else if from > to {
            -offset
        } else {
            0.0
        }
    };
    Point2::new(center.x + toward(center.x, mid.x), center.y + toward(center.y, mid.y))
}

/// Carve every enabled hole into `model`.
///
/// Each hole is tried at its nominal position and, if that fails, once more
/// moved inward by the fallback offset. A hole failing both times is skipped
/// with a warning; the model keeps its previous solid.
pub fn carve_holes(model: &mut TileModel, config: &HoleConfig) -> (Vec<CarvedHole>, Vec<TileWarning>) {
    let inset = config.effective_inset();
    let mut carved = Vec::new();
    let mut warnings = Vec::new();

    for site in HoleSite::enabled(config) {
        let nominal = site.position(model.footprint(), inset);
        let retry = inward(nominal, model.footprint(), config.fallback_offset);
        let mut outcome = Err(BuildError::OutsideTile);
        for (center, relocated) in [(nominal, false), (retry, true)] {
            let cavity = Cavity::from_config(center, config);
            outcome = check_placement(&cavity, model.patch(), model.cavities(), config, model.anchor_z())
                .and_then(|()| model.add_cavity(cavity));
            match &outcome {
                Ok(()) => {
                    carved.push(CarvedHole {
                        site,
                        center,
                        relocated,
                    });
                    break;
                }
                Err(e) => debug!("Tile {}: hole at {site} ({center:?}) rejected: {e}", model.id()),
            }
        }
        if let Err(reason) = outcome {
            warn!("Tile {}: hole at {site} skipped: {reason}", model.id());
            warnings.push(TileWarning::HoleSkipped { site, reason });
        }
    }
    (carved, warnings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn footprint() -> Rect {
        Rect::new(Point2::new(0.0, 0.0), Point2::new(0.2, 0.2))
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    #[test]
    fn corner_sites_sit_at_the_inset() {
        let config = HoleConfig::default();
        let inset = config.effective_inset();
        assert_relative_eq!(inset, 0.006);
        let sites = HoleSite::enabled(&config);
        assert_eq!(sites.len(), 4);
        let ne = HoleSite::NorthEast.position(&footprint(), inset);
        assert_relative_eq!(ne.x, 0.194, epsilon = 1e-15);
        assert_relative_eq!(ne.y, 0.194, epsilon = 1e-15);
    }

    #[test]
    fn midpoints_follow_corners() {
        let config = HoleConfig::default().with_edge_midpoints(true);
        let sites = HoleSite::enabled(&config);
        assert_eq!(sites.len(), 8);
        assert_eq!(sites[4], HoleSite::Midpoint(Edge::South));
        let w = HoleSite::Midpoint(Edge::West).position(&footprint(), 0.006);
        assert_eq!(w, Point2::new(0.006, 0.1));
        assert!(HoleSite::enabled(&HoleConfig::disabled()).is_empty());
    }

    #[test]
    fn inward_moves_towards_center_only_off_axis() {
        let fp = footprint();
        assert_eq!(inward(Point2::new(0.006, 0.194), &fp, 0.002), Point2::new(0.008, 0.192));
        assert_eq!(inward(Point2::new(0.1, 0.006), &fp, 0.002), Point2::new(0.1, 0.008));
    }

    #[test]
    fn clearance_against_rims() {
        let rims = vec![square(0.0, 0.0, 0.2, 0.2)];
        let r = 0.005;
        assert!(check_clearance(&Point2::new(0.006, 0.006), r, &rims, 0.0005).is_ok());
        assert!(matches!(
            check_clearance(&Point2::new(0.0052, 0.1), r, &rims, 0.0005),
            Err(BuildError::Clearance { .. })
        ));
        assert_eq!(
            check_clearance(&Point2::new(0.3, 0.1), r, &rims, 0.0005),
            Err(BuildError::OutsideTile)
        );
    }

    #[test]
    fn clearance_respects_inner_rims() {
        // Courtyard in the middle of the tile.
        let mut inner = square(0.05, 0.05, 0.15, 0.15);
        inner.reverse();
        let rims = vec![square(0.0, 0.0, 0.2, 0.2), inner];
        assert_eq!(
            check_clearance(&Point2::new(0.1, 0.1), 0.005, &rims, 0.0005),
            Err(BuildError::OutsideTile)
        );
        assert!(check_clearance(&Point2::new(0.025, 0.1), 0.005, &rims, 0.0005).is_ok());
    }

    #[test]
    fn site_labels() {
        assert_eq!(HoleSite::SouthEast.to_string(), "SE corner");
        assert_eq!(HoleSite::Midpoint(Edge::North).to_string(), "N midpoint");
    }
}
