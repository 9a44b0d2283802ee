//! Run report.

use std::fmt;
use std::path::PathBuf;

use crate::error::TileWarning;
use crate::grid::CellId;

/// A tile written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSummary {
    /// Grid cell.
    pub id: CellId,
    /// Output file.
    pub path: PathBuf,
    /// Footprint rectangle area.
    pub footprint_area: f64,
    /// Area of the cut surface seen from above.
    pub covered_area: f64,
    /// Solid volume.
    pub volume: f64,
    /// Triangle count of the solid.
    pub triangles: usize,
    /// Holes carved.
    pub holes: usize,
    /// Butterflies built.
    pub butterflies: usize,
    /// Volume of the quantized underside columns.
    pub column_volume: f64,
}

/// A tile with warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedTile {
    /// Grid cell.
    pub id: CellId,
    /// What went wrong, in processing order.
    pub warnings: Vec<TileWarning>,
    /// Whether a file was still written.
    pub exported: bool,
}

/// Outcome of a tiling run, in grid order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Grid columns.
    pub columns: usize,
    /// Grid rows.
    pub rows: usize,
    /// Map scale denominator the input was built at.
    pub scale_denominator: u32,
    /// Tiles written.
    pub written: Vec<TileSummary>,
    /// Cells dropped because nothing of the surface lies inside them.
    pub empty: Vec<CellId>,
    /// Tiles with at least one warning.
    pub degraded: Vec<DegradedTile>,
}

impl RunReport {
    /// True when every processed tile was written without any warning.
    #[must_use]
    pub fn is_full_success(&self) -> bool {
        self.degraded.is_empty()
    }

    /// Tiles that could not be written.
    pub fn failed(&self) -> impl Iterator<Item = &DegradedTile> {
        self.degraded.iter().filter(|t| !t.exported)
    }

    /// Sum of the written tiles' footprint areas.
    #[must_use]
    pub fn footprint_area(&self) -> f64 {
        self.written.iter().map(|t| t.footprint_area).sum()
    }

    /// Sum of the written tiles' volumes.
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.written.iter().map(|t| t.volume).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tiling Report")?;
        writeln!(f, "=============")?;
        writeln!(f, "Grid: {} x {} (scale 1:{})", self.columns, self.rows, self.scale_denominator)?;
        writeln!(
            f,
            "Tiles: {} written, {} empty, {} degraded",
            self.written.len(),
            self.empty.len(),
            self.degraded.len()
        )?;
        writeln!(
            f,
            "Footprint: {:.4} m^2, volume {:.6} m^3",
            self.footprint_area(),
            self.total_volume()
        )?;

        if !self.written.is_empty() {
            writeln!(f)?;
            for t in &self.written {
                writeln!(
                    f,
                    "  {} {}: {} triangles, {} holes, {} butterflies, volume {:.6}",
                    t.id,
                    t.path.display(),
                    t.triangles,
                    t.holes,
                    t.butterflies,
                    t.volume
                )?;
            }
        }

        if !self.degraded.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for t in &self.degraded {
                let state = if t.exported { "exported" } else { "not exported" };
                writeln!(f, "  {} ({state}):", t.id)?;
                for w in &t.warnings {
                    writeln!(f, "    - {w}")?;
                }
            }
        }

        if self.is_full_success() {
            writeln!(f)?;
            writeln!(f, "Status: OK")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::grid::Edge;

    fn summary(col: usize) -> TileSummary {
        TileSummary {
            id: CellId::new(col, 0),
            path: PathBuf::from(format!("tile_{col}_0.stl")),
            footprint_area: 0.04,
            covered_area: 0.04,
            volume: 0.001,
            triangles: 12,
            holes: 4,
            butterflies: 1,
            column_volume: 0.0,
        }
    }

    #[test]
    fn clean_run_is_a_full_success() {
        let report = RunReport {
            columns: 2,
            rows: 1,
            scale_denominator: 1250,
            written: vec![summary(0), summary(1)],
            ..RunReport::default()
        };
        assert!(report.is_full_success());
        assert!((report.footprint_area() - 0.08).abs() < 1e-15);
        let text = report.to_string();
        assert!(text.contains("Grid: 2 x 1 (scale 1:1250)"));
        assert!(text.contains("Status: OK"));
    }

    #[test]
    fn warnings_are_listed() {
        let report = RunReport {
            columns: 2,
            rows: 1,
            scale_denominator: 1250,
            written: vec![summary(0)],
            empty: vec![],
            degraded: vec![
                DegradedTile {
                    id: CellId::new(0, 0),
                    warnings: vec![TileWarning::ConnectorReduced {
                        edge: Edge::East,
                        scale: 0.5,
                    }],
                    exported: true,
                },
                DegradedTile {
                    id: CellId::new(1, 0),
                    warnings: vec![TileWarning::ExportRefused {
                        path: PathBuf::from("tile_1_0.stl"),
                    }],
                    exported: false,
                },
            ],
        };
        assert!(!report.is_full_success());
        assert_eq!(report.failed().count(), 1);
        let text = report.to_string();
        assert!(text.contains("(0,0) (exported)"));
        assert!(text.contains("butterfly on edge E reduced to scale 0.5"));
        assert!(!text.contains("Status: OK"));
    }
}
