//! Tiling configuration.
//!
//! [`TilingConfig`] is one explicit value threaded through every stage. All
//! lengths are meters at print scale. Every struct deserializes with
//! defaults for missing fields, so a JSON file only needs the values it
//! changes.
//!
//! # Example
//!
//! ```
//! use mesh_tile::{StlFormat, TilingConfig};
//!
//! let config = TilingConfig::default()
//!     .with_tile_size(0.25)
//!     .with_edge_inset(0.005)
//!     .with_format(StlFormat::Ascii);
//! assert!(config.validate().is_ok());
//! assert!(TilingConfig::default().with_edge_inset(0.15).validate().is_err());
//! ```

use mesh_io::StlEncoding;
use mesh_repair::RepairParams;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::CellId;

/// Top-level tiling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilingConfig {
    /// Tile edge length `T`.
    pub tile_size: f64,
    /// Map scale denominator applied upstream (reported only).
    pub scale_denominator: u32,
    /// Height of the anchor plane every tile bottom sits on.
    pub anchor_z: f64,
    /// Input repair and framing.
    pub normalize: NormalizeConfig,
    /// Magnet holes.
    pub holes: HoleConfig,
    /// Underside profile.
    pub underside: UndersideConfig,
    /// Edge connectors.
    pub connectors: ConnectorConfig,
    /// Output files.
    pub export: ExportConfig,
    /// Process only this cell (its neighbours are still cut to plan connectors).
    pub only: Option<CellId>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_size: 0.20,
            scale_denominator: 1250,
            anchor_z: 0.0,
            normalize: NormalizeConfig::default(),
            holes: HoleConfig::default(),
            underside: UndersideConfig::default(),
            connectors: ConnectorConfig::default(),
            export: ExportConfig::default(),
            only: None,
        }
    }
}

impl TilingConfig {
    /// Set the tile edge length.
    #[must_use]
    pub fn with_tile_size(mut self, tile_size: f64) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Set the magnet hole edge inset.
    #[must_use]
    pub fn with_edge_inset(mut self, inset: f64) -> Self {
        self.holes.edge_inset = inset;
        self
    }

    /// Set the underside quantization step.
    #[must_use]
    pub fn with_quantization_step(mut self, step: f64) -> Self {
        self.underside.quantization_step = step;
        self
    }

    /// Set the anchor plane height.
    #[must_use]
    pub fn with_anchor_z(mut self, anchor_z: f64) -> Self {
        self.anchor_z = anchor_z;
        self
    }

    /// Set the output STL format.
    #[must_use]
    pub fn with_format(mut self, format: StlFormat) -> Self {
        self.export.format = format;
        self
    }

    /// Allow replacing existing tile files.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.export.overwrite = overwrite;
        self
    }

    /// Restrict the run to one cell.
    #[must_use]
    pub fn with_only(mut self, only: Option<CellId>) -> Self {
        self.only = only;
        self
    }

    /// Replace the hole configuration.
    #[must_use]
    pub fn with_holes(mut self, holes: HoleConfig) -> Self {
        self.holes = holes;
        self
    }

    /// Replace the connector configuration.
    #[must_use]
    pub fn with_connectors(mut self, connectors: ConnectorConfig) -> Self {
        self.connectors = connectors;
        self
    }

    /// Replace the normalizer configuration.
    #[must_use]
    pub fn with_normalize(mut self, normalize: NormalizeConfig) -> Self {
        self.normalize = normalize;
        self
    }

    /// Check every parameter before any geometry is processed.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found, checking the tile size, the
    /// inset and the quantization step first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(ConfigError::TileSize {
                value: self.tile_size,
            });
        }
        if !(self.holes.edge_inset < self.tile_size / 2.0) {
            return Err(ConfigError::InsetTooLarge {
                inset: self.holes.edge_inset,
                tile_size: self.tile_size,
            });
        }
        // Holes are placed at the effective inset, which can exceed the configured one.
        let inset = self.holes.effective_inset();
        if (self.holes.corners || self.holes.edge_midpoints) && !(inset < self.tile_size / 2.0) {
            return Err(ConfigError::InsetTooLarge {
                inset,
                tile_size: self.tile_size,
            });
        }
        let step = self.underside.quantization_step;
        if !(step.is_finite() && step > 0.0) {
            return Err(ConfigError::Quantization { value: step });
        }
        require_finite("anchor_z", self.anchor_z)?;
        self.normalize.validate()?;
        self.holes.validate()?;
        self.underside.validate()?;
        self.connectors.validate()
    }
}

fn require_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Parameter { field, value })
    }
}

fn require_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Parameter { field, value })
    }
}

/// Input repair and frame placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Vertices closer than this are merged.
    pub weld_epsilon: f64,
    /// Faces with smaller area are removed.
    pub degenerate_area: f64,
    /// Largest boundary loop (in edges) that is filled; 0 disables filling.
    pub max_fill_edges: usize,
    /// Lowest point ends up this far above the anchor plane.
    pub base_lift: f64,
    /// Translate the mesh along Z so its base sits at `anchor_z + base_lift`.
    pub place_frame: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-4,
            degenerate_area: 1e-12,
            max_fill_edges: 1000,
            base_lift: 0.005,
            place_frame: true,
        }
    }
}

impl NormalizeConfig {
    /// Keep the input where it is.
    #[must_use]
    pub fn with_place_frame(mut self, place: bool) -> Self {
        self.place_frame = place;
        self
    }

    /// Set the weld distance.
    #[must_use]
    pub fn with_weld_epsilon(mut self, epsilon: f64) -> Self {
        self.weld_epsilon = epsilon;
        self
    }

    /// Repair parameters for the mesh-repair pipeline.
    #[must_use]
    pub fn repair_params(&self) -> RepairParams {
        RepairParams::default()
            .with_weld_epsilon(self.weld_epsilon)
            .with_degenerate_area_threshold(self.degenerate_area)
            .with_max_fill_edges(self.max_fill_edges)
            .with_remove_unreferenced(true)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("normalize.weld_epsilon", self.weld_epsilon)?;
        require_non_negative("normalize.degenerate_area", self.degenerate_area)?;
        require_non_negative("normalize.base_lift", self.base_lift)
    }
}

/// Countersink frustum above the magnet shaft.
///
/// The shaft top is stepped in by `shoulder`, then narrows at `half_angle_deg`
/// from vertical to a flat tip of `tip_radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountersinkProfile {
    /// Radial step between shaft and frustum base.
    pub shoulder: f64,
    /// Half opening angle in degrees.
    pub half_angle_deg: f64,
    /// Radius of the flat tip.
    pub tip_radius: f64,
}

impl Default for CountersinkProfile {
    fn default() -> Self {
        Self {
            shoulder: 0.001,
            half_angle_deg: 45.0,
            tip_radius: 0.0005,
        }
    }
}

impl CountersinkProfile {
    /// Height of the frustum over a shaft of radius `shaft_radius`.
    #[must_use]
    pub fn height(&self, shaft_radius: f64) -> f64 {
        (shaft_radius - self.shoulder - self.tip_radius) / self.half_angle_deg.to_radians().tan()
    }
}

/// Magnet hole placement and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HoleConfig {
    /// Place one hole at every footprint corner.
    pub corners: bool,
    /// Also place one hole at every edge midpoint.
    pub edge_midpoints: bool,
    /// Shaft radius.
    pub shaft_radius: f64,
    /// Shaft depth above the bottom face.
    pub shaft_depth: f64,
    /// Frustum above the shaft.
    pub countersink: CountersinkProfile,
    /// Distance from the tile edges to the shaft center.
    pub edge_inset: f64,
    /// Minimum wall kept around the shaft when the inset is too small.
    pub wall_margin: f64,
    /// Minimum material between a cavity and the tile wall or another cavity.
    pub min_wall: f64,
    /// Minimum surface height over the cavity top.
    pub min_roof: f64,
    /// Inward move used for the retry.
    pub fallback_offset: f64,
    /// Polygon segments approximating the round cavity.
    pub segments: usize,
}

impl Default for HoleConfig {
    fn default() -> Self {
        Self {
            corners: true,
            edge_midpoints: false,
            shaft_radius: 0.005,
            shaft_depth: 0.002,
            countersink: CountersinkProfile::default(),
            edge_inset: 0.004,
            wall_margin: 0.001,
            min_wall: 0.0005,
            min_roof: 0.001,
            fallback_offset: 0.002,
            segments: 32,
        }
    }
}

impl HoleConfig {
    /// No holes at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            corners: false,
            edge_midpoints: false,
            ..Self::default()
        }
    }

    /// Enable or disable edge-midpoint holes.
    #[must_use]
    pub fn with_edge_midpoints(mut self, enabled: bool) -> Self {
        self.edge_midpoints = enabled;
        self
    }

    /// Distance from the edges to a shaft center.
    ///
    /// Never less than the shaft radius plus the wall margin.
    #[must_use]
    pub fn effective_inset(&self) -> f64 {
        self.edge_inset.max(self.shaft_radius + self.wall_margin)
    }

    /// Height of the cavity above the anchor plane.
    #[must_use]
    pub fn cavity_height(&self) -> f64 {
        self.shaft_depth + self.countersink.height(self.shaft_radius)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("shaft radius", self.shaft_radius),
            ("shaft depth", self.shaft_depth),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::MagnetDimension { field, value });
            }
        }
        require_non_negative("holes.edge_inset", self.edge_inset)?;
        require_non_negative("holes.wall_margin", self.wall_margin)?;
        require_non_negative("holes.min_wall", self.min_wall)?;
        require_non_negative("holes.min_roof", self.min_roof)?;
        require_non_negative("holes.fallback_offset", self.fallback_offset)?;
        if self.segments < 8 {
            #[allow(clippy::cast_precision_loss)]
            let value = self.segments as f64;
            return Err(ConfigError::Parameter {
                field: "holes.segments",
                value,
            });
        }

        let cs = &self.countersink;
        if !(cs.shoulder.is_finite() && cs.shoulder >= 0.0) {
            return Err(ConfigError::Countersink {
                reason: format!("shoulder {} must be non-negative", cs.shoulder),
            });
        }
        if !(cs.tip_radius.is_finite() && cs.tip_radius > 0.0) {
            return Err(ConfigError::Countersink {
                reason: format!("tip radius {} must be positive", cs.tip_radius),
            });
        }
        if !(cs.half_angle_deg > 0.0 && cs.half_angle_deg < 90.0) {
            return Err(ConfigError::Countersink {
                reason: format!("half angle {} must be in (0, 90)", cs.half_angle_deg),
            });
        }
        if cs.shoulder + cs.tip_radius >= self.shaft_radius {
            return Err(ConfigError::Countersink {
                reason: format!(
                    "shoulder {} plus tip {} is wider than the shaft radius {}",
                    cs.shoulder, cs.tip_radius, self.shaft_radius
                ),
            });
        }
        Ok(())
    }
}

/// Underside profile sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UndersideConfig {
    /// Sub-cell edge for the column profile.
    pub quantization_step: f64,
    /// Surface vertices lower than this above the anchor are lifted.
    pub min_surface_clearance: f64,
}

impl Default for UndersideConfig {
    fn default() -> Self {
        Self {
            quantization_step: 0.02,
            min_surface_clearance: 0.001,
        }
    }
}

impl UndersideConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("underside.min_surface_clearance", self.min_surface_clearance)
    }
}

/// Dovetail outline of one butterfly half.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ButterflyTemplate {
    /// Width at the tile edge.
    pub neck: f64,
    /// Width at full depth.
    pub flare: f64,
    /// Distance from the edge to the wide end.
    pub depth: f64,
}

impl Default for ButterflyTemplate {
    fn default() -> Self {
        Self {
            neck: 0.016,
            flare: 0.024,
            depth: 0.008,
        }
    }
}

impl ButterflyTemplate {
    /// Template with every dimension multiplied by `scale`.
    #[must_use]
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            neck: self.neck * scale,
            flare: self.flare * scale,
            depth: self.depth * scale,
        }
    }
}

/// Edge connectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Build butterflies on shared edges; when off every edge stays flush.
    pub enabled: bool,
    /// Butterfly shape at full scale.
    pub butterfly: ButterflyTemplate,
    /// Scale used for the retry.
    pub fallback_scale: f64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            butterfly: ButterflyTemplate::default(),
            fallback_scale: 0.5,
        }
    }
}

impl ConnectorConfig {
    /// Flush edges everywhere.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// How far beyond a footprint the surface has to be gathered.
    #[must_use]
    pub fn margin(&self) -> f64 {
        if self.enabled {
            self.butterfly.depth + 0.001
        } else {
            0.0
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.butterfly;
        for (name, value) in [("neck", b.neck), ("flare", b.flare), ("depth", b.depth)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Butterfly {
                    reason: format!("{name} must be positive, got {value}"),
                });
            }
        }
        if b.flare <= b.neck {
            return Err(ConfigError::Butterfly {
                reason: format!("flare {} must be wider than neck {}", b.flare, b.neck),
            });
        }
        if !(self.fallback_scale > 0.0 && self.fallback_scale <= 1.0) {
            return Err(ConfigError::Parameter {
                field: "connectors.fallback_scale",
                value: self.fallback_scale,
            });
        }
        Ok(())
    }
}

/// STL flavour written for each tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StlFormat {
    /// Binary STL.
    #[default]
    Binary,
    /// ASCII STL.
    Ascii,
}

impl From<StlFormat> for StlEncoding {
    fn from(format: StlFormat) -> Self {
        match format {
            StlFormat::Binary => Self::Binary,
            StlFormat::Ascii => Self::Ascii,
        }
    }
}

/// Output files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Binary or ASCII.
    pub format: StlFormat,
    /// Replace existing tile files.
    pub overwrite: bool,
}
