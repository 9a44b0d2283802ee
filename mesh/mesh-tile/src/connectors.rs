//! Edge connectors: flush outer edges and butterfly dovetails between tiles.
//!
//! Each shared edge gets one butterfly half on either side. Tiles with an
//! even `col + row` grow a tab across the edge, odd tiles get the matching
//! notch.
//!
//! Scales are settled in three steps. Every tile first offers, per edge, the
//! largest scale its own half builds at ([`offer_edges`]). Partners then
//! agree on the smaller of their two offers, or skip the edge on both sides
//! when either half cannot be built ([`agree_edges`]). Finally each tile
//! builds the agreed halves ([`attach_connectors`]); a half that still fails
//! is renegotiated with [`fall_back`] by the caller.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cavity::Cavity;
use crate::config::{ButterflyTemplate, ConnectorConfig, HoleConfig};
use crate::error::{BuildError, BuildResult, TileWarning};
use crate::grid::{Cell, CellId, Edge, Grid};
use crate::outline::{dovetail, EdgeProfile};
use crate::tile::TileModel;

/// Connector variant of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectorKind {
    /// No neighbour: the edge stays straight and flush.
    FlushOuter,
    /// Neighbour present: a butterfly half centered on the edge.
    ButterflyInner,
}

/// Which half of a butterfly a tile carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Tab beyond the edge.
    Male,
    /// Notch cut into the tile.
    Female,
}

impl Gender {
    /// Gender of every butterfly on tile `id`.
    #[must_use]
    pub const fn of(id: CellId) -> Self {
        if id.is_even() { Self::Male } else { Self::Female }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlushOuter => write!(f, "flush"),
            Self::ButterflyInner => write!(f, "butterfly"),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
        }
    }
}

/// Planned connector of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSpec {
    /// Tile edge.
    pub edge: Edge,
    /// Variant.
    pub kind: ConnectorKind,
    /// Butterfly half, `None` for flush edges.
    pub gender: Option<Gender>,
}

impl fmt::Display for ConnectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gender {
            Some(gender) => write!(f, "{}:{} ({gender})", self.edge, self.kind),
            None => write!(f, "{}:{}", self.edge, self.kind),
        }
    }
}

/// Outcome of one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedConnector {
    /// What was planned.
    pub spec: ConnectorSpec,
    /// Template scale of the butterfly built, `None` for a flush edge or a
    /// skipped butterfly.
    pub scale: Option<f64>,
}

/// Plan the four edges of tile `id`, in [`Edge::ALL`] order.
///
/// A neighbour counts when it lies inside the grid and `occupied` reports
/// it non-empty. With connectors disabled every edge is flush.
pub fn plan_connectors(
    grid: &Grid,
    id: CellId,
    occupied: impl Fn(CellId) -> bool,
    enabled: bool,
) -> [ConnectorSpec; 4] {
    Edge::ALL.map(|edge| {
        let shared = enabled && grid.neighbor(id, edge).is_some_and(&occupied);
        if shared {
            ConnectorSpec {
                edge,
                kind: ConnectorKind::ButterflyInner,
                gender: Some(Gender::of(id)),
            }
        } else {
            ConnectorSpec {
                edge,
                kind: ConnectorKind::FlushOuter,
                gender: None,
            }
        }
    })
}

/// Check that `template` fits the edge shared by `cell` and `neighbor`.
///
/// The flare has to stay clear of the corner-hole keep-outs (including the
/// hole retry offset), the depth may use at most half of either cell, and a
/// notch must not reach an edge-midpoint hole.
///
/// # Errors
///
/// [`BuildError::ConnectorFit`] when any of these fails.
pub fn butterfly_fits(
    cell: &Cell,
    neighbor: &Cell,
    edge: Edge,
    template: &ButterflyTemplate,
    holes: &HoleConfig,
) -> BuildResult<()> {
    let inset = holes.effective_inset();
    let radius = Cavity::from_config(cell.footprint.center(), holes).polygon_radius();

    let keep_out = if holes.corners {
        inset + holes.fallback_offset + radius + holes.min_wall
    } else {
        0.0
    };
    let along = template.flare + 2.0 * keep_out <= cell.edge_length(edge);
    let across = template.depth <= cell.depth_across(edge) / 2.0
        && template.depth <= neighbor.depth_across(edge.opposite()) / 2.0;
    let midpoint = !holes.edge_midpoints || template.depth + holes.min_wall <= inset - radius;

    if along && across && midpoint {
        Ok(())
    } else {
        Err(BuildError::ConnectorFit)
    }
}

/// What a tile builds on one edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgePlan {
    /// Straight edge.
    Flush,
    /// Butterfly half at this template scale.
    Butterfly {
        /// Template scale.
        scale: f64,
    },
    /// Planned butterfly left straight.
    Skipped {
        /// Why it was dropped.
        reason: BuildError,
    },
}

fn scales(config: &ConnectorConfig) -> Vec<f64> {
    let mut scales = vec![1.0];
    if config.fallback_scale < 1.0 {
        scales.push(config.fallback_scale);
    }
    scales
}

/// Largest scale at which each planned butterfly of `model` builds on its
/// own, in [`Edge::ALL`] order.
///
/// Every edge is tried on a copy of `model`, first at full scale and then at
/// the fallback scale.
#[must_use]
pub fn offer_edges(
    model: &TileModel,
    grid: &Grid,
    specs: &[ConnectorSpec; 4],
    config: &ConnectorConfig,
    holes: &HoleConfig,
) -> [EdgePlan; 4] {
    specs.map(|spec| {
        let Some(gender) = spec.gender else {
            return EdgePlan::Flush;
        };
        let mut reason = BuildError::ConnectorFit;
        for scale in scales(config) {
            let mut trial = model.clone();
            match try_butterfly(&mut trial, grid, spec.edge, gender, &config.butterfly.scaled(scale), holes) {
                Ok(()) => return EdgePlan::Butterfly { scale },
                Err(e) => {
                    debug!(
                        "Tile {}: butterfly on {} at scale {scale} rejected: {e}",
                        model.id(),
                        spec.edge
                    );
                    reason = e;
                }
            }
        }
        EdgePlan::Skipped { reason }
    })
}

/// Settle every shared edge on one plan for both partners.
///
/// Two butterfly offers meet at the smaller scale. If either side rejected
/// its half, or the partner has no offer at all, both sides skip the edge.
#[must_use]
pub fn agree_edges(grid: &Grid, offers: &BTreeMap<CellId, [EdgePlan; 4]>) -> BTreeMap<CellId, [EdgePlan; 4]> {
    offers
        .iter()
        .map(|(&id, own)| {
            let agreed = Edge::ALL.map(|edge| {
                let EdgePlan::Butterfly { scale } = own[edge.index()] else {
                    return own[edge.index()].clone();
                };
                let Some(partner) = grid.neighbor(id, edge) else {
                    return EdgePlan::Skipped {
                        reason: BuildError::ConnectorFit,
                    };
                };
                match offers.get(&partner).map(|theirs| &theirs[edge.opposite().index()]) {
                    Some(EdgePlan::Butterfly { scale: other }) => EdgePlan::Butterfly {
                        scale: scale.min(*other),
                    },
                    _ => EdgePlan::Skipped {
                        reason: BuildError::PartnerRejected { cell: partner },
                    },
                }
            });
            (id, agreed)
        })
        .collect()
}

/// Plan to use after the agreed butterfly `plan` failed with `reason`.
///
/// A full-scale butterfly drops to the fallback scale, anything else is
/// skipped.
#[must_use]
pub fn fall_back(plan: &EdgePlan, reason: BuildError, config: &ConnectorConfig) -> EdgePlan {
    match *plan {
        EdgePlan::Butterfly { scale } if scale > config.fallback_scale => EdgePlan::Butterfly {
            scale: config.fallback_scale,
        },
        _ => EdgePlan::Skipped { reason },
    }
}

/// Build the agreed butterflies into `model`.
///
/// Reduced and skipped edges are reported as warnings.
///
/// # Errors
///
/// The first edge whose agreed butterfly does not build, with the reason.
/// `model` may already carry earlier butterflies, so callers retry on a
/// fresh copy.
pub fn attach_connectors(
    model: &mut TileModel,
    grid: &Grid,
    specs: &[ConnectorSpec; 4],
    plans: &[EdgePlan; 4],
    config: &ConnectorConfig,
    holes: &HoleConfig,
) -> Result<(Vec<PlacedConnector>, Vec<TileWarning>), (Edge, BuildError)> {
    let mut placed = Vec::with_capacity(4);
    let mut warnings = Vec::new();

    for (&spec, plan) in specs.iter().zip(plans) {
        let scale = match (spec.gender, plan) {
            (Some(gender), &EdgePlan::Butterfly { scale }) => {
                try_butterfly(model, grid, spec.edge, gender, &config.butterfly.scaled(scale), holes)
                    .map_err(|e| (spec.edge, e))?;
                if scale < 1.0 {
                    warnings.push(TileWarning::ConnectorReduced { edge: spec.edge, scale });
                }
                Some(scale)
            }
            (Some(_), EdgePlan::Skipped { reason }) => {
                warnings.push(TileWarning::ConnectorSkipped {
                    edge: spec.edge,
                    reason: reason.clone(),
                });
                None
            }
            _ => None,
        };
        placed.push(PlacedConnector { spec, scale });
    }
    Ok((placed, warnings))
}

fn try_butterfly(
    model: &mut TileModel,
    grid: &Grid,
    edge: Edge,
    gender: Gender,
    template: &ButterflyTemplate,
    holes: &HoleConfig,
) -> BuildResult<()> {
    let cell = grid.cell(model.id()).ok_or(BuildError::OutsideTile)?;
    let neighbor = grid
        .neighbor(model.id(), edge)
        .and_then(|id| grid.cell(id))
        .ok_or(BuildError::ConnectorFit)?;
    butterfly_fits(&cell, &neighbor, edge, template, holes)?;

    let points = dovetail(
        &cell,
        edge,
        template.neck,
        template.flare,
        template.depth,
        gender == Gender::Male,
    );
    let outline = model.outline().with_profile(edge, EdgeProfile::Dovetail(points));
    model.reshape(outline, holes.min_wall)
}
