//! Underside profile: quantized column heights under the surface.
//!
//! The footprint is divided into square sub-cells of the quantization step
//! (the last row and column are clipped to the footprint). Each sub-cell
//! records the lowest surface point over it and the tallest multiple of the
//! step that stays under that point.
//!
//! The profile is informational. Tiles are built with a flat bottom on the
//! anchor plane; the column heights only feed the per-tile report
//! (`column_volume`) and the below-anchor warnings.

use mesh_types::{IndexedMesh, Point2, Rect};
use tracing::{debug, warn};

use crate::config::UndersideConfig;
use crate::error::TileWarning;
use crate::planar::{clip_to_rect, overlaps, planar_bounds};

/// Slack so a surface lying exactly on a step boundary rounds up to it.
const STEP_TOLERANCE: f64 = 1e-9;

/// Column heights of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct UndersideProfile {
    footprint: Rect,
    step: f64,
    anchor_z: f64,
    columns: usize,
    rows: usize,
    samples: Vec<Option<f64>>,
    heights: Vec<f64>,
}

impl UndersideProfile {
    /// Sample the minimum height of `surface` over every sub-cell of `footprint`.
    ///
    /// Returns the profile and a warning for every sub-cell sampled below
    /// the anchor plane. Nothing here shapes the solid.
    #[must_use]
    pub fn sample(
        surface: &IndexedMesh,
        footprint: &Rect,
        config: &UndersideConfig,
        anchor_z: f64,
    ) -> (Self, Vec<TileWarning>) {
        let step = config.quantization_step;
        let columns = subdivisions(footprint.width(), step);
        let rows = subdivisions(footprint.height(), step);
        let mut profile = Self {
            footprint: *footprint,
            step,
            anchor_z,
            columns,
            rows,
            samples: vec![None; columns * rows],
            heights: vec![0.0; columns * rows],
        };

        for &face in &surface.faces {
            let tri = face.map(|v| surface.position(v));
            let bounds = planar_bounds(&tri);
            if !overlaps(&bounds, footprint) {
                continue;
            }
            let (i0, i1) = (profile.index_x(bounds.min.x), profile.index_x(bounds.max.x));
            let (j0, j1) = (profile.index_y(bounds.min.y), profile.index_y(bounds.max.y));
            for j in j0..=j1 {
                for i in i0..=i1 {
                    let Some(piece) = clip_to_rect(&tri, &profile.subcell(i, j)) else {
                        continue;
                    };
                    let low = piece.iter().map(|p| p.z).fold(f64::INFINITY, f64::min);
                    let slot = &mut profile.samples[j * columns + i];
                    *slot = Some(slot.map_or(low, |z| z.min(low)));
                }
            }
        }

        let mut warnings = Vec::new();
        for j in 0..rows {
            for i in 0..columns {
                let k = j * columns + i;
                let Some(z) = profile.samples[k] else {
                    continue;
                };
                if z < anchor_z {
                    warn!("Underside sub-cell ({i},{j}) at z={z:.4} is below the anchor, clamped");
                    warnings.push(TileWarning::SubcellBelowAnchor { i, j, z });
                }
                profile.heights[k] = quantize(z - anchor_z, step);
            }
        }
        debug!(
            "Underside profile {}x{}, tallest column {:.3}",
            columns,
            rows,
            profile.heights.iter().copied().fold(0.0, f64::max)
        );
        (profile, warnings)
    }

    /// Number of sub-cells along X.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Number of sub-cells along Y.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Quantization step.
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Anchor plane height.
    #[must_use]
    pub const fn anchor_z(&self) -> f64 {
        self.anchor_z
    }

    /// Rectangle of sub-cell `(i, j)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn subcell(&self, i: usize, j: usize) -> Rect {
        let x0 = self.footprint.min.x + i as f64 * self.step;
        let y0 = self.footprint.min.y + j as f64 * self.step;
        let x1 = if i + 1 == self.columns {
            self.footprint.max.x
        } else {
            self.footprint.min.x + (i + 1) as f64 * self.step
        };
        let y1 = if j + 1 == self.rows {
            self.footprint.max.y
        } else {
            self.footprint.min.y + (j + 1) as f64 * self.step
        };
        Rect {
            min: Point2::new(x0, y0),
            max: Point2::new(x1, y1),
        }
    }

    /// Lowest surface height over sub-cell `(i, j)`, if any surface lies over it.
    #[must_use]
    pub fn sample_at(&self, i: usize, j: usize) -> Option<f64> {
        self.samples.get(j * self.columns + i).copied().flatten()
    }

    /// Column height of sub-cell `(i, j)` above the anchor.
    #[must_use]
    pub fn height(&self, i: usize, j: usize) -> f64 {
        self.heights.get(j * self.columns + i).copied().unwrap_or(0.0)
    }

    /// All column heights, row by row.
    #[must_use]
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Volume of the quantized columns.
    #[must_use]
    pub fn column_volume(&self) -> f64 {
        (0..self.rows)
            .flat_map(|j| (0..self.columns).map(move |i| (i, j)))
            .map(|(i, j)| self.height(i, j) * self.subcell(i, j).area())
            .sum()
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn index_x(&self, x: f64) -> usize {
        let k = ((x - self.footprint.min.x) / self.step).floor().max(0.0) as usize;
        k.min(self.columns - 1)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn index_y(&self, y: f64) -> usize {
        let k = ((y - self.footprint.min.y) / self.step).floor().max(0.0) as usize;
        k.min(self.rows - 1)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn subdivisions(extent: f64, step: f64) -> usize {
    let count = (extent / step - STEP_TOLERANCE).ceil();
    if count.is_finite() && count >= 1.0 {
        count as usize
    } else {
        1
    }
}

/// Largest non-negative multiple of `step` not above `height`.
#[must_use]
pub fn quantize(height: f64, step: f64) -> f64 {
    let steps = (height / step + STEP_TOLERANCE).floor();
    if steps > 0.0 { steps * step } else { 0.0 }
}

/// Lift every vertex below `floor` up to it. Returns the number lifted.
pub fn clamp_surface(surface: &mut IndexedMesh, floor: f64) -> usize {
    let mut lifted = 0;
    for vertex in &mut surface.vertices {
        if vertex.position.z < floor {
            vertex.position.z = floor;
            lifted += 1;
        }
    }
    lifted
}
