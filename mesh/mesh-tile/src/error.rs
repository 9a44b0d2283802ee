//! Error and warning types for tiling.
//!
//! Three tiers:
//! - [`ConfigError`]: rejected before any geometry is touched
//! - [`TileError`]: fatal for the whole run
//! - [`TileWarning`]: recorded against one tile, the run continues
//!
//! [`BuildError`] is internal to a single solid rebuild and usually ends up
//! as the reason inside a [`TileWarning`].

use std::path::PathBuf;

use thiserror::Error;

use crate::grid::{CellId, Edge};
use crate::holes::HoleSite;

/// Result type for fatal tiling errors.
pub type TileResult<T> = Result<T, TileError>;

/// Result type for a single solid rebuild.
pub type BuildResult<T> = Result<T, BuildError>;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Tile edge length is not a positive finite number.
    #[error("tile size must be positive and finite, got {value}")]
    TileSize {
        /// Configured tile size.
        value: f64,
    },

    /// Corner holes would always collide with the adjacent edges.
    #[error("edge inset {inset} must be less than half the tile size {tile_size}")]
    InsetTooLarge {
        /// Configured inset.
        inset: f64,
        /// Configured tile size.
        tile_size: f64,
    },

    /// Underside quantization step is not a positive finite number.
    #[error("quantization step must be positive and finite, got {value}")]
    Quantization {
        /// Configured step.
        value: f64,
    },

    /// A magnet dimension is not positive.
    #[error("magnet {field} must be positive, got {value}")]
    MagnetDimension {
        /// Name of the dimension.
        field: &'static str,
        /// Configured value.
        value: f64,
    },

    /// Countersink profile does not fit the shaft.
    #[error("invalid countersink: {reason}")]
    Countersink {
        /// What is wrong with the profile.
        reason: String,
    },

    /// Butterfly template is not a valid dovetail.
    #[error("invalid butterfly template: {reason}")]
    Butterfly {
        /// What is wrong with the template.
        reason: String,
    },

    /// Single-tile mode names a cell outside the grid.
    #[error("cell {cell} is outside the {columns}x{rows} grid")]
    CellOutOfGrid {
        /// Requested cell.
        cell: CellId,
        /// Grid columns.
        columns: usize,
        /// Grid rows.
        rows: usize,
    },

    /// Any other parameter outside its valid range.
    #[error("{field} out of range: {value}")]
    Parameter {
        /// Name of the parameter.
        field: &'static str,
        /// Configured value.
        value: f64,
    },
}

/// Fatal tiling error. No tile is produced.
#[derive(Debug, Error)]
pub enum TileError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The input mesh has no faces.
    #[error("input mesh is empty")]
    EmptyMesh,

    /// The input cannot be repaired into a closed manifold.
    #[error("input mesh is not a closed manifold: {details}")]
    NonManifoldInput {
        /// Which check failed.
        details: String,
    },

    /// No face of the input faces upwards, so there is nothing to tile.
    #[error("input mesh has no upward-facing surface")]
    NoUpwardSurface,

    /// Reading the input file failed.
    #[error("failed to read input: {0}")]
    Read(#[from] mesh_io::IoError),

    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Failure of one immutable build step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// The cut surface has an edge used twice in the same direction.
    #[error("surface patch is non-manifold at edge {a}->{b}")]
    NonManifoldPatch {
        /// Edge start.
        a: u32,
        /// Edge end.
        b: u32,
    },

    /// Two rim loops touch at a vertex.
    #[error("surface rim is pinched at vertex {vertex}")]
    PinchedRim {
        /// The shared vertex.
        vertex: u32,
    },

    /// A rim does not close into a loop.
    #[error("surface rim is open at vertex {vertex}")]
    OpenRim {
        /// Last vertex reached.
        vertex: u32,
    },

    /// A rim has no planar extent or doubles back on itself.
    #[error("degenerate rim: {reason}")]
    DegenerateRim {
        /// What is degenerate.
        reason: String,
    },

    /// The surface patch is empty.
    #[error("surface patch is empty")]
    EmptyPatch,

    /// A surface piece or the bottom polygon could not be triangulated.
    #[error("triangulation failed: {reason}")]
    Triangulation {
        /// Where it got stuck.
        reason: String,
    },

    /// A feature comes too close to the tile wall or another feature.
    #[error("clearance {clearance:.4} below required {required:.4}")]
    Clearance {
        /// Available clearance.
        clearance: f64,
        /// Required clearance.
        required: f64,
    },

    /// A feature lies outside the tile outline.
    #[error("feature lies outside the tile")]
    OutsideTile,

    /// The surface over a cavity is too thin.
    #[error("roof over cavity is {roof:.4}, need {required:.4}")]
    ThinRoof {
        /// Distance from cavity top to the lowest surface point above it.
        roof: f64,
        /// Required roof thickness.
        required: f64,
    },

    /// The connector does not fit the shared edge.
    #[error("connector does not fit the edge")]
    ConnectorFit,

    /// The tile across the edge cannot build its half of the butterfly.
    #[error("neighbour {cell} cannot build its half")]
    PartnerRejected {
        /// Neighbouring tile.
        cell: CellId,
    },

    /// The rebuilt solid is not a closed manifold.
    #[error("solid is not closed: {details}")]
    NotClosed {
        /// Edge check report.
        details: String,
    },

    /// The rebuilt solid has no positive volume.
    #[error("solid volume is not positive: {volume:.3e}")]
    NonPositiveVolume {
        /// Signed volume.
        volume: f64,
    },
}

/// Recoverable problem recorded against one tile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileWarning {
    /// Surface vertices were lifted to the minimum clearance above the anchor.
    #[error("{count} surface vertices clamped to z={floor:.4}")]
    SurfaceClamped {
        /// Number of lifted vertices.
        count: usize,
        /// Height they were lifted to.
        floor: f64,
    },

    /// An underside sample lies below the anchor plane.
    #[error("underside sub-cell ({i},{j}) sampled at z={z:.4} below the anchor, clamped")]
    SubcellBelowAnchor {
        /// Sub-cell column.
        i: usize,
        /// Sub-cell row.
        j: usize,
        /// Sampled minimum height.
        z: f64,
    },

    /// A hole failed twice and was left out.
    #[error("hole at {site} skipped: {reason}")]
    HoleSkipped {
        /// Which hole.
        site: HoleSite,
        /// Why the retry failed.
        reason: BuildError,
    },

    /// A butterfly only fit at reduced scale.
    #[error("butterfly on edge {edge} reduced to scale {scale}")]
    ConnectorReduced {
        /// Which edge.
        edge: Edge,
        /// Scale that succeeded.
        scale: f64,
    },

    /// A butterfly failed at every scale and was left out.
    #[error("butterfly on edge {edge} skipped: {reason}")]
    ConnectorSkipped {
        /// Which edge.
        edge: Edge,
        /// Why the last attempt failed.
        reason: BuildError,
    },

    /// The base solid could not be built; the tile is not exported.
    #[error("solid could not be built: {reason}")]
    SolidFailed {
        /// Why the build failed.
        reason: BuildError,
    },

    /// The tile file already exists and overwriting is disabled.
    #[error("refused to overwrite {path}")]
    ExportRefused {
        /// Existing file.
        path: PathBuf,
    },

    /// Writing the tile file failed.
    #[error("export failed: {reason}")]
    ExportFailed {
        /// Underlying error text.
        reason: String,
    },
}

impl TileWarning {
    /// True when the warning means no file was written for the tile.
    #[must_use]
    pub const fn blocks_export(&self) -> bool {
        matches!(
            self,
            Self::SolidFailed { .. } | Self::ExportRefused { .. } | Self::ExportFailed { .. }
        )
    }
}
