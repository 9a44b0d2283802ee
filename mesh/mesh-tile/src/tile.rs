//! Tile model: the inputs a tile solid is built from, and its current solid.
//!
//! Every feature is applied by building a new solid from the updated inputs
//! and committing both only when the build succeeds. A failed step leaves
//! the previous solid in place.

use mesh_types::{IndexedMesh, Rect};
use tracing::debug;

use crate::cavity::Cavity;
use crate::cut::{cut_patch, SurfacePatch};
use crate::error::BuildResult;
use crate::grid::{Cell, CellId};
use crate::holes::check_clearance;
use crate::outline::Outline;
use crate::solid::build_solid;

/// One tile under construction.
#[derive(Debug, Clone)]
pub struct TileModel {
    id: CellId,
    footprint: Rect,
    source: IndexedMesh,
    outline: Outline,
    patch: SurfacePatch,
    cavities: Vec<Cavity>,
    solid: IndexedMesh,
    anchor_z: f64,
}

impl TileModel {
    /// Build the base solid of `cell` from its cut surface.
    ///
    /// `source` is the gathered surface the patch was cut from; it is kept
    /// so the outline can be changed later.
    ///
    /// # Errors
    ///
    /// Any [`BuildError`](crate::BuildError) from [`build_solid`].
    pub fn build(cell: &Cell, source: IndexedMesh, patch: SurfacePatch, anchor_z: f64) -> BuildResult<Self> {
        let solid = build_solid(&patch, &[], anchor_z)?;
        Ok(Self {
            id: cell.id,
            footprint: cell.footprint,
            source,
            outline: Outline::rect(cell.footprint),
            patch,
            cavities: Vec::new(),
            solid,
            anchor_z,
        })
    }

    /// Grid cell of the tile.
    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    /// Footprint rectangle.
    #[must_use]
    pub const fn footprint(&self) -> &Rect {
        &self.footprint
    }

    /// Current outline.
    #[must_use]
    pub const fn outline(&self) -> &Outline {
        &self.outline
    }

    /// Current cut surface.
    #[must_use]
    pub const fn patch(&self) -> &SurfacePatch {
        &self.patch
    }

    /// Cavities carved so far.
    #[must_use]
    pub fn cavities(&self) -> &[Cavity] {
        &self.cavities
    }

    /// Current solid.
    #[must_use]
    pub const fn solid(&self) -> &IndexedMesh {
        &self.solid
    }

    /// Anchor plane height.
    #[must_use]
    pub const fn anchor_z(&self) -> f64 {
        self.anchor_z
    }

    /// Add a cavity and rebuild.
    ///
    /// # Errors
    ///
    /// The rebuild error; the model is unchanged.
    pub fn add_cavity(&mut self, cavity: Cavity) -> BuildResult<()> {
        let mut cavities = self.cavities.clone();
        cavities.push(cavity);
        let solid = build_solid(&self.patch, &cavities, self.anchor_z)?;
        self.cavities = cavities;
        self.solid = solid;
        Ok(())
    }

    /// Re-cut the surface with `outline` and rebuild.
    ///
    /// Every cavity already carved must keep `min_wall` to the new rims.
    ///
    /// # Errors
    ///
    /// A cut, clearance or rebuild error; the model is unchanged.
    pub fn reshape(&mut self, outline: Outline, min_wall: f64) -> BuildResult<()> {
        let patch = cut_patch(&self.source, &outline)?;
        let rims = patch.rim_polygons();
        for cavity in &self.cavities {
            check_clearance(&cavity.center, cavity.polygon_radius(), &rims, min_wall)?;
        }
        let solid = build_solid(&patch, &self.cavities, self.anchor_z)?;
        debug!(
            "Tile {}: outline reshaped, area {:.5} -> {:.5}",
            self.id,
            self.outline.area(),
            outline.area()
        );
        self.outline = outline;
        self.patch = patch;
        self.solid = solid;
        Ok(())
    }

    /// Take the finished solid.
    #[must_use]
    pub fn into_solid(self) -> IndexedMesh {
        self.solid
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::HoleConfig;
    use crate::error::BuildError;
    use crate::grid::{Edge, Grid};
    use crate::outline::{dovetail, EdgeProfile};
    use approx::assert_relative_eq;
    use mesh_types::{Point2, Vertex};

    fn plateau() -> (Grid, IndexedMesh) {
        let grid = Grid::new(Rect::new(Point2::new(0.0, 0.0), Point2::new(0.4, 0.2)), 0.2).unwrap();
        let mut sheet = IndexedMesh::new();
        for (x, y) in [(-0.05, -0.05), (0.45, -0.05), (0.45, 0.25), (-0.05, 0.25)] {
            sheet.vertices.push(Vertex::from_coords(x, y, 0.03));
        }
        sheet.faces.push([0, 1, 2]);
        sheet.faces.push([0, 2, 3]);
        (grid, sheet)
    }

    fn model(id: CellId) -> TileModel {
        let (grid, sheet) = plateau();
        let cell = grid.cell(id).unwrap();
        let patch = cut_patch(&sheet, &Outline::rect(cell.footprint)).unwrap();
        TileModel::build(&cell, sheet, patch, 0.0).unwrap()
    }

    #[test]
    fn base_solid_fills_the_footprint() {
        let tile = model(CellId::new(0, 0));
        assert_relative_eq!(tile.solid().volume(), 0.2 * 0.2 * 0.03, epsilon = 1e-15);
        assert!(tile.cavities().is_empty());
    }

    #[test]
    fn cavity_is_committed_only_on_success() {
        let mut tile = model(CellId::new(0, 0));
        let before = tile.solid().volume();
        let config = HoleConfig::default();

        let outside = Cavity::from_config(Point2::new(0.3, 0.1), &config);
        assert!(tile.add_cavity(outside).is_err());
        assert_eq!(tile.solid().volume(), before);

        tile.add_cavity(Cavity::from_config(Point2::new(0.1, 0.1), &config)).unwrap();
        assert_eq!(tile.cavities().len(), 1);
        assert!(tile.solid().volume() < before);
    }

    #[test]
    fn reshape_adds_a_tab() {
        let (grid, _) = plateau();
        let mut tile = model(CellId::new(0, 0));
        let cell = grid.cell(CellId::new(0, 0)).unwrap();
        let tab = dovetail(&cell, Edge::East, 0.016, 0.024, 0.008, true);
        let outline = tile.outline().with_profile(Edge::East, EdgeProfile::Dovetail(tab));
        let before = tile.solid().volume();
        tile.reshape(outline, 0.0005).unwrap();
        let tab_area = (0.016 + 0.024) / 2.0 * 0.008;
        assert_relative_eq!(tile.solid().volume() - before, tab_area * 0.03, epsilon = 1e-12);
    }

    #[test]
    fn reshape_keeps_cavity_walls() {
        let (grid, _) = plateau();
        let mut tile = model(CellId::new(1, 0));
        let config = HoleConfig::default();
        tile.add_cavity(Cavity::from_config(Point2::new(0.212, 0.1), &config)).unwrap();
        let cell = grid.cell(CellId::new(1, 0)).unwrap();
        let notch = dovetail(&cell, Edge::West, 0.016, 0.024, 0.008, false);
        let outline = tile.outline().with_profile(Edge::West, EdgeProfile::Dovetail(notch));
        let before = tile.solid().volume();
        assert!(matches!(
            tile.reshape(outline, config.min_wall),
            Err(BuildError::Clearance { .. } | BuildError::OutsideTile)
        ));
        assert_eq!(tile.solid().volume(), before);
        assert_eq!(tile.outline(), &Outline::rect(cell.footprint));
    }
}
