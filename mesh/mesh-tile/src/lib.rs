//! Cut a closed city mesh into printable grid tiles.
//!
//! The tiler turns one watertight terrain-and-buildings mesh into a set of
//! square tiles that print separately and snap together on a table:
//!
//! 1. [`normalize`]: repair, validate and place the mesh on its base
//! 2. [`Grid`]: partition the footprint into `T` x `T` cells
//! 3. [`cut`]: cut the upward surface of every cell along its outline
//! 4. [`solid`]: close each patch into a solid with a flat bottom on the
//!    anchor plane, with a quantized [`UndersideProfile`] reported alongside
//! 5. [`holes`]: carve magnet cavities at the corners
//! 6. [`connectors`]: flush outer edges, butterfly dovetails between tiles
//! 7. [`export_tile`]: write `tile_{col}_{row}.stl`
//!
//! Each tile is built by immutable steps: a hole or a connector produces a
//! new solid from the updated tile model, and the old solid is kept when the
//! new one fails validation.
//!
//! # Example
//!
//! ```no_run
//! use mesh_tile::{TilingConfig, TilingEngine};
//! use std::path::Path;
//!
//! let config = TilingConfig::default().with_tile_size(0.25);
//! let engine = TilingEngine::new(config).unwrap();
//! let report = engine.run_stl(Path::new("city.stl"), Path::new("tiles")).unwrap();
//! assert!(report.is_full_success());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod cavity;
mod config;
pub mod connectors;
pub mod cut;
mod error;
mod export;
mod grid;
pub mod holes;
mod normalize;
pub mod outline;
mod pipeline;
pub mod planar;
mod report;
pub mod solid;
mod surface;
pub mod tile;
pub mod underside;

pub use cavity::{Cavity, CavityShell};
pub use config::{
    ButterflyTemplate, ConnectorConfig, CountersinkProfile, ExportConfig, HoleConfig, NormalizeConfig,
    StlFormat, TilingConfig, UndersideConfig,
};
pub use connectors::{ConnectorKind, ConnectorSpec, EdgePlan, Gender, PlacedConnector};
pub use cut::SurfacePatch;
pub use error::{BuildError, BuildResult, ConfigError, TileError, TileResult, TileWarning};
pub use export::{export_tile, tile_file_name};
pub use grid::{Cell, CellId, Edge, Grid};
pub use holes::{CarvedHole, HoleSite};
pub use normalize::{normalize, NormalizedMesh};
pub use outline::{EdgeProfile, Outline};
pub use pipeline::{BuiltTile, PlannedTile, TilingEngine, TilingPlan};
pub use report::{DegradedTile, RunReport, TileSummary};
pub use surface::{extract_sheet, SheetSummary};
pub use tile::TileModel;
pub use underside::UndersideProfile;
