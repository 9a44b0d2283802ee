//! Regular tile grid over the planar bounds of the mesh.
//!
//! Cells are ordered row-major (row, then column). Every coordinate that two
//! cells share is computed by the same expression, so neighbours agree on
//! their common edge bit for bit.

use std::cmp::Ordering;
use std::fmt;

use mesh_types::{Point2, Rect};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Relative slack so an exact multiple of the tile size does not add a sliver.
const COUNT_TOLERANCE: f64 = 1e-9;

/// Grid coordinate of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    /// Column index, increasing with X.
    pub col: usize,
    /// Row index, increasing with Y.
    pub row: usize,
}

impl CellId {
    /// Create a cell id.
    #[must_use]
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }

    /// True when `col + row` is even.
    #[must_use]
    pub const fn is_even(&self) -> bool {
        (self.col + self.row) % 2 == 0
    }
}

impl Ord for CellId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

impl PartialOrd for CellId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.col, self.row)
    }
}

/// Side of a tile. North is +Y, East is +X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Edge {
    /// Edge at maximum Y.
    North,
    /// Edge at maximum X.
    East,
    /// Edge at minimum Y.
    South,
    /// Edge at minimum X.
    West,
}

impl Edge {
    /// All edges in reporting order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Edges in counter-clockwise traversal order, starting at the minimum corner.
    pub const CCW: [Self; 4] = [Self::South, Self::East, Self::North, Self::West];

    /// The edge facing this one on the neighbouring tile.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Position in [`Edge::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Column/row step towards the neighbour across this edge.
    #[must_use]
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }

    /// Single-letter label.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::North => 'N',
            Self::East => 'E',
            Self::South => 'S',
            Self::West => 'W',
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Grid coordinate.
    pub id: CellId,
    /// Full `T` x `T` grid rectangle.
    pub rect: Rect,
    /// Grid rectangle clipped to the mesh bounds.
    pub footprint: Rect,
}

impl Cell {
    /// Corner of the footprint and the tile edge it belongs to.
    ///
    /// Returns the two end points of `edge` in counter-clockwise order.
    #[must_use]
    pub fn edge_segment(&self, edge: Edge) -> (Point2<f64>, Point2<f64>) {
        let [sw, se, ne, nw] = self.footprint.corners();
        match edge {
            Edge::South => (sw, se),
            Edge::East => (se, ne),
            Edge::North => (ne, nw),
            Edge::West => (nw, sw),
        }
    }

    /// Footprint extent perpendicular to `edge`.
    #[must_use]
    pub fn depth_across(&self, edge: Edge) -> f64 {
        match edge {
            Edge::North | Edge::South => self.footprint.height(),
            Edge::East | Edge::West => self.footprint.width(),
        }
    }

    /// Length of `edge`.
    #[must_use]
    pub fn edge_length(&self, edge: Edge) -> f64 {
        match edge {
            Edge::North | Edge::South => self.footprint.width(),
            Edge::East | Edge::West => self.footprint.height(),
        }
    }
}

/// Axis-aligned grid of `columns` x `rows` square cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    origin: Point2<f64>,
    tile_size: f64,
    columns: usize,
    rows: usize,
    bounds: Rect,
}

impl Grid {
    /// Lay a grid over `bounds` with square cells of edge `tile_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TileSize`] if `tile_size` is not a positive,
    /// finite number.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_tile::{CellId, Grid};
    /// use mesh_types::{Point2, Rect};
    ///
    /// let bounds = Rect::new(Point2::new(0.0, 0.0), Point2::new(1.0, 0.5));
    /// let grid = Grid::new(bounds, 0.2).unwrap();
    /// assert_eq!((grid.columns(), grid.rows()), (5, 3));
    /// assert_eq!(grid.cell_of(Point2::new(0.2, 0.1)), Some(CellId::new(0, 0)));
    /// ```
    pub fn new(bounds: Rect, tile_size: f64) -> Result<Self, ConfigError> {
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(ConfigError::TileSize { value: tile_size });
        }
        Ok(Self {
            origin: bounds.min,
            tile_size,
            columns: count_along(bounds.width(), tile_size),
            rows: count_along(bounds.height(), tile_size),
            bounds,
        })
    }

    /// Number of columns.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Tile edge length.
    #[must_use]
    pub const fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Planar bounds the grid covers.
    #[must_use]
    pub const fn bounds(&self) -> &Rect {
        &self.bounds
    }

    /// Total number of cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.columns * self.rows
    }

    /// Always false: a grid has at least one cell.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Check whether `(col, row)` is a cell of this grid.
    #[must_use]
    pub const fn contains(&self, col: usize, row: usize) -> bool {
        col < self.columns && row < self.rows
    }

    #[allow(clippy::cast_precision_loss)]
    fn x_at(&self, k: usize) -> f64 {
        self.origin.x + k as f64 * self.tile_size
    }

    #[allow(clippy::cast_precision_loss)]
    fn y_at(&self, k: usize) -> f64 {
        self.origin.y + k as f64 * self.tile_size
    }

    /// Cell descriptor for `id`, or `None` outside the grid.
    #[must_use]
    pub fn cell(&self, id: CellId) -> Option<Cell> {
        if !self.contains(id.col, id.row) {
            return None;
        }
        let rect = Rect::new(
            Point2::new(self.x_at(id.col), self.y_at(id.row)),
            Point2::new(self.x_at(id.col + 1), self.y_at(id.row + 1)),
        );
        let footprint = Rect {
            min: Point2::new(rect.min.x.max(self.bounds.min.x), rect.min.y.max(self.bounds.min.y)),
            max: Point2::new(rect.max.x.min(self.bounds.max.x), rect.max.y.min(self.bounds.max.y)),
        };
        Some(Cell {
            id,
            rect,
            footprint,
        })
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows)
            .flat_map(move |row| (0..self.columns).map(move |col| CellId::new(col, row)))
            .filter_map(|id| self.cell(id))
    }

    /// Cell containing `p`; points on a grid line go to the lower index.
    ///
    /// Returns `None` for points outside the grid bounds.
    #[must_use]
    pub fn cell_of(&self, p: Point2<f64>) -> Option<CellId> {
        if !self.bounds.contains(&p) {
            return None;
        }
        let col = lower_index((p.x - self.origin.x) / self.tile_size, self.columns);
        let row = lower_index((p.y - self.origin.y) / self.tile_size, self.rows);
        Some(CellId::new(col, row))
    }

    /// Inclusive column range whose cells touch `[x0, x1]`.
    pub(crate) fn column_span(&self, x0: f64, x1: f64) -> Option<(usize, usize)> {
        span(x0, x1, self.origin.x, self.tile_size, self.columns)
    }

    /// Inclusive row range whose cells touch `[y0, y1]`.
    pub(crate) fn row_span(&self, y0: f64, y1: f64) -> Option<(usize, usize)> {
        span(y0, y1, self.origin.y, self.tile_size, self.rows)
    }

    /// Neighbour across `edge`, if it is inside the grid.
    #[must_use]
    pub fn neighbor(&self, id: CellId, edge: Edge) -> Option<CellId> {
        let (dc, dr) = edge.offset();
        let col = id.col.checked_add_signed(dc)?;
        let row = id.row.checked_add_signed(dr)?;
        self.contains(col, row).then_some(CellId::new(col, row))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn count_along(extent: f64, tile_size: f64) -> usize {
    let count = (extent / tile_size - COUNT_TOLERANCE).ceil();
    if count.is_finite() && count >= 1.0 {
        count as usize
    } else {
        1
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn lower_index(t: f64, count: usize) -> usize {
    let k = t.ceil() - 1.0;
    if k <= 0.0 {
        0
    } else {
        (k as usize).min(count - 1)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn span(lo: f64, hi: f64, origin: f64, size: f64, count: usize) -> Option<(usize, usize)> {
    let a = ((lo - origin) / size).floor();
    let b = ((hi - origin) / size).floor();
    if b < 0.0 || a >= count as f64 || !(a.is_finite() && b.is_finite()) {
        return None;
    }
    let clamp = |v: f64| (v.max(0.0) as usize).min(count - 1);
    Some((clamp(a), clamp(b)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn rect(w: f64, h: f64) -> Rect {
        Rect::new(Point2::new(0.0, 0.0), Point2::new(w, h))
    }

    #[test]
    fn exact_multiple_has_no_sliver() {
        let grid = Grid::new(rect(1.0, 1.0), 0.2).unwrap();
        assert_eq!(grid.columns(), 5);
        assert_eq!(grid.rows(), 5);
        assert_eq!(grid.cells().count(), 25);
    }

    #[test]
    fn partial_tiles_round_up() {
        let grid = Grid::new(rect(1.05, 0.3), 0.2).unwrap();
        assert_eq!((grid.columns(), grid.rows()), (6, 2));

        let last = grid.cell(CellId::new(5, 1)).unwrap();
        assert!((last.footprint.width() - 0.05).abs() < 1e-12);
        assert!((last.footprint.height() - 0.1).abs() < 1e-12);
        assert!((last.rect.width() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn zero_extent_has_one_cell() {
        let grid = Grid::new(rect(0.0, 0.0), 0.2).unwrap();
        assert_eq!(grid.len(), 1);
        assert!(grid.cell(CellId::new(0, 0)).unwrap().footprint.is_empty());
    }

    #[test]
    fn grid_line_goes_to_lower_cell() {
        let grid = Grid::new(rect(1.0, 1.0), 0.25).unwrap();
        assert_eq!(grid.cell_of(Point2::new(0.25, 0.5)), Some(CellId::new(0, 1)));
        assert_eq!(grid.cell_of(Point2::new(0.0, 0.0)), Some(CellId::new(0, 0)));
        assert_eq!(grid.cell_of(Point2::new(1.0, 1.0)), Some(CellId::new(3, 3)));
        assert_eq!(grid.cell_of(Point2::new(0.26, 0.74)), Some(CellId::new(1, 2)));
        assert_eq!(grid.cell_of(Point2::new(1.1, 0.5)), None);
    }

    #[test]
    fn neighbours_share_edges_exactly() {
        let grid = Grid::new(rect(0.9, 0.7), 0.3).unwrap();
        for cell in grid.cells() {
            for edge in Edge::ALL {
                let Some(other) = grid.neighbor(cell.id, edge) else {
                    continue;
                };
                let other = grid.cell(other).unwrap();
                let (a, b) = cell.edge_segment(edge);
                let (c, d) = other.edge_segment(edge.opposite());
                assert_eq!((a, b), (d, c));
            }
        }
    }

    #[test]
    fn neighbor_outside_grid() {
        let grid = Grid::new(rect(0.4, 0.4), 0.2).unwrap();
        let corner = CellId::new(0, 0);
        assert_eq!(grid.neighbor(corner, Edge::West), None);
        assert_eq!(grid.neighbor(corner, Edge::South), None);
        assert_eq!(grid.neighbor(corner, Edge::East), Some(CellId::new(1, 0)));
        assert_eq!(grid.neighbor(corner, Edge::North), Some(CellId::new(0, 1)));
    }

    #[test]
    fn invalid_tile_size() {
        assert!(Grid::new(rect(1.0, 1.0), 0.0).is_err());
        assert!(Grid::new(rect(1.0, 1.0), f64::NAN).is_err());
        assert!(Grid::new(rect(1.0, 1.0), -0.2).is_err());
    }

    #[test]
    fn cell_order_is_row_major() {
        let mut ids = vec![CellId::new(1, 0), CellId::new(0, 1), CellId::new(0, 0)];
        ids.sort();
        assert_eq!(ids, vec![CellId::new(0, 0), CellId::new(1, 0), CellId::new(0, 1)]);
    }

    #[test]
    fn spans_cover_touching_cells() {
        let grid = Grid::new(rect(1.0, 1.0), 0.25).unwrap();
        assert_eq!(grid.column_span(0.2, 0.3), Some((0, 1)));
        assert_eq!(grid.column_span(-1.0, -0.5), None);
        assert_eq!(grid.row_span(0.9, 2.0), Some((3, 3)));
    }
}
