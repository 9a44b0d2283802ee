//! Tiling engine: plans the grid, then builds and exports every tile.
//!
//! Planning runs the normalizer, the grid partitioner and the cutter, and
//! decides every connector. Building runs in rayon phases: each tile is
//! clamped, profiled, solidified and drilled on its own, then partners agree
//! on their butterfly scales, and finally every tile builds the agreed
//! halves. Export is one rayon task per tile. Results are collected in grid
//! order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use mesh_io::load_stl;
use mesh_repair::{OrientSummary, RepairSummary};
use mesh_types::{Aabb, IndexedMesh, Rect};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::TilingConfig;
use crate::connectors::{
    agree_edges, attach_connectors, fall_back, offer_edges, plan_connectors, ConnectorKind, ConnectorSpec, EdgePlan,
    PlacedConnector,
};
use crate::cut::{cut_patch, gather_cells, SurfacePatch};
use crate::error::{BuildError, ConfigError, TileError, TileResult, TileWarning};
use crate::export::export_tile;
use crate::grid::{Cell, CellId, Edge, Grid};
use crate::holes::{carve_holes, CarvedHole};
use crate::normalize::normalize;
use crate::outline::Outline;
use crate::report::{DegradedTile, RunReport, TileSummary};
use crate::surface::{extract_sheet, SheetSummary};
use crate::tile::TileModel;
use crate::underside::{clamp_surface, UndersideProfile};

/// A non-empty cell, cut and ready to be built.
#[derive(Debug, Clone)]
pub struct PlannedTile {
    /// Grid cell.
    pub cell: Cell,
    /// Surface gathered around the cell, including the connector margin.
    pub source: IndexedMesh,
    /// Surface cut to the footprint.
    pub patch: SurfacePatch,
    /// Connector of every edge, in [`Edge::ALL`] order.
    pub connectors: [ConnectorSpec; 4],
}

/// Everything decided before any solid is built.
#[derive(Debug, Clone)]
pub struct TilingPlan {
    /// Tile grid.
    pub grid: Grid,
    /// Bounds of the normalized mesh.
    pub bounds: Aabb,
    /// What repair changed.
    pub repair: RepairSummary,
    /// What orientation changed.
    pub orient: OrientSummary,
    /// Z translation applied by the normalizer.
    pub lift: f64,
    /// Surface sheet statistics.
    pub sheet: SheetSummary,
    /// Tiles to build, in grid order.
    pub tiles: Vec<PlannedTile>,
    /// Neighbours cut only so the tiles in `tiles` can agree on their
    /// butterflies. Never exported.
    pub context: Vec<PlannedTile>,
    /// Cells without surface.
    pub empty: Vec<CellId>,
    /// Cells whose cut failed.
    pub failed: Vec<(CellId, BuildError)>,
}

impl TilingPlan {
    /// Number of butterfly halves planned over all tiles.
    #[must_use]
    pub fn butterfly_count(&self) -> usize {
        self.count_kind(ConnectorKind::ButterflyInner)
    }

    /// Number of flush edges planned over all tiles.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.count_kind(ConnectorKind::FlushOuter)
    }

    fn count_kind(&self, kind: ConnectorKind) -> usize {
        self.tiles
            .iter()
            .flat_map(|t| t.connectors.iter())
            .filter(|c| c.kind == kind)
            .count()
    }
}

impl fmt::Display for TilingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let planar = self.grid.bounds();
        writeln!(
            f,
            "Grid: {} x {} cells of {} m over {:.3} x {:.3} m",
            self.grid.columns(),
            self.grid.rows(),
            self.grid.tile_size(),
            planar.width(),
            planar.height()
        )?;
        writeln!(
            f,
            "Height: {:.4}..{:.4} m (lifted {:.4} m)",
            self.bounds.min.z, self.bounds.max.z, self.lift
        )?;
        writeln!(
            f,
            "Repair: {} vertices welded, {} holes filled, {} faces flipped",
            self.repair.vertices_welded, self.repair.holes_filled, self.orient.faces_flipped
        )?;
        writeln!(
            f,
            "Sheet: {} upward, {} wall faces",
            self.sheet.upward, self.sheet.walls
        )?;
        writeln!(
            f,
            "Tiles: {} planned, {} empty, {} failed; {} butterfly halves, {} flush edges",
            self.tiles.len(),
            self.empty.len(),
            self.failed.len(),
            self.butterfly_count(),
            self.flush_count()
        )?;
        for tile in &self.tiles {
            let connectors: Vec<String> = tile.connectors.iter().map(ToString::to_string).collect();
            writeln!(
                f,
                "  {} {:.3} x {:.3}: {}",
                tile.cell.id,
                tile.cell.footprint.width(),
                tile.cell.footprint.height(),
                connectors.join(" ")
            )?;
        }
        for id in &self.empty {
            writeln!(f, "  {id} empty")?;
        }
        for (id, reason) in &self.failed {
            writeln!(f, "  {id} cut failed: {reason}")?;
        }
        Ok(())
    }
}

/// A tile after building, before export.
#[derive(Debug, Clone)]
pub struct BuiltTile {
    /// Grid cell.
    pub id: CellId,
    /// Footprint rectangle.
    pub footprint: Rect,
    /// Finished solid, `None` if the base solid failed.
    pub solid: Option<IndexedMesh>,
    /// Surface area seen from above.
    pub covered_area: f64,
    /// Underside column profile.
    pub profile: UndersideProfile,
    /// Holes carved.
    pub holes: Vec<CarvedHole>,
    /// Connector outcome per edge.
    pub connectors: Vec<PlacedConnector>,
    /// Warnings in processing order.
    pub warnings: Vec<TileWarning>,
}

impl BuiltTile {
    /// Butterflies actually built.
    #[must_use]
    pub fn butterflies(&self) -> usize {
        self.connectors.iter().filter(|c| c.scale.is_some()).count()
    }
}

/// Tiling engine holding a validated configuration.
///
/// # Example
///
/// ```no_run
/// use mesh_tile::{TilingConfig, TilingEngine};
/// use std::path::Path;
///
/// let engine = TilingEngine::new(TilingConfig::default()).unwrap();
/// let report = engine.run_stl(Path::new("city.stl"), Path::new("tiles")).unwrap();
/// println!("{report}");
/// ```
#[derive(Debug, Clone)]
pub struct TilingEngine {
    config: TilingConfig,
}

impl TilingEngine {
    /// Validate `config` and create an engine.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] found.
    pub fn new(config: TilingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &TilingConfig {
        &self.config
    }

    /// Load `input` and run the whole pipeline, writing tiles to `out_dir`.
    ///
    /// # Errors
    ///
    /// [`TileError::Read`] if the input cannot be loaded, otherwise as
    /// [`TilingEngine::run`].
    pub fn run_stl(&self, input: &Path, out_dir: &Path) -> TileResult<RunReport> {
        info!("Loading {}", input.display());
        let mesh = load_stl(input)?;
        self.run(mesh, out_dir)
    }

    /// Plan and process `mesh`, writing tiles to `out_dir`.
    ///
    /// # Errors
    ///
    /// Any fatal error of [`TilingEngine::plan`] or [`TilingEngine::process`].
    pub fn run(&self, mesh: IndexedMesh, out_dir: &Path) -> TileResult<RunReport> {
        let plan = self.plan(mesh)?;
        self.process(&plan, out_dir)
    }

    /// Normalize, partition and cut `mesh`, and plan every connector.
    ///
    /// With `only` set just that cell and its neighbours are cut. Only that
    /// cell is planned for export; the neighbours go to
    /// [`TilingPlan::context`].
    ///
    /// # Errors
    ///
    /// - [`TileError::EmptyMesh`] or [`TileError::NonManifoldInput`] from
    ///   normalization
    /// - [`TileError::NoUpwardSurface`] if nothing faces up
    /// - [`ConfigError::CellOutOfGrid`] if `only` names a cell outside the grid
    pub fn plan(&self, mesh: IndexedMesh) -> TileResult<TilingPlan> {
        let config = &self.config;
        let normalized = normalize(mesh, &config.normalize, config.anchor_z)?;
        let grid = Grid::new(normalized.planar, config.tile_size)?;
        info!(
            "Grid {} x {} of {} m tiles",
            grid.columns(),
            grid.rows(),
            grid.tile_size()
        );

        let targets: Vec<CellId> = match config.only {
            Some(id) if !grid.contains(id.col, id.row) => {
                return Err(ConfigError::CellOutOfGrid {
                    cell: id,
                    columns: grid.columns(),
                    rows: grid.rows(),
                }
                .into());
            }
            Some(id) => vec![id],
            None => grid.cells().map(|c| c.id).collect(),
        };
        let mut to_cut = targets.clone();
        if config.only.is_some() {
            to_cut.extend(targets.iter().flat_map(|&id| Edge::ALL.map(|e| grid.neighbor(id, e))).flatten());
            to_cut.sort();
            to_cut.dedup();
        }

        let (sheet, sheet_summary) = extract_sheet(&normalized.mesh)?;
        let mut sources = gather_cells(&sheet, &grid, config.connectors.margin());

        let cuts: Vec<(Cell, Result<SurfacePatch, BuildError>)> = to_cut
            .par_iter()
            .filter_map(|&id| grid.cell(id))
            .map(|cell| {
                let k = cell.id.row * grid.columns() + cell.id.col;
                (cell, cut_patch(&sources[k], &Outline::rect(cell.footprint)))
            })
            .collect();

        let mut occupied = vec![false; grid.len()];
        for (cell, cut) in &cuts {
            occupied[cell.id.row * grid.columns() + cell.id.col] = !matches!(cut, Err(BuildError::EmptyPatch));
        }

        let mut tiles = Vec::new();
        let mut context = Vec::new();
        let mut empty = Vec::new();
        let mut failed = Vec::new();
        for (cell, cut) in cuts {
            let target = targets.contains(&cell.id);
            match cut {
                Ok(patch) => {
                    let connectors = plan_connectors(
                        &grid,
                        cell.id,
                        |n| occupied[n.row * grid.columns() + n.col],
                        config.connectors.enabled,
                    );
                    let k = cell.id.row * grid.columns() + cell.id.col;
                    let planned = PlannedTile {
                        cell,
                        source: std::mem::take(&mut sources[k]),
                        patch,
                        connectors,
                    };
                    if target {
                        tiles.push(planned);
                    } else {
                        context.push(planned);
                    }
                }
                Err(_) if !target => {}
                Err(BuildError::EmptyPatch) => {
                    debug!("Tile {}: no surface, dropped", cell.id);
                    empty.push(cell.id);
                }
                Err(reason) => {
                    warn!("Tile {}: cut failed: {reason}", cell.id);
                    failed.push((cell.id, reason));
                }
            }
        }

        let plan = TilingPlan {
            grid,
            bounds: normalized.bounds,
            repair: normalized.repair,
            orient: normalized.orient,
            lift: normalized.lift,
            sheet: sheet_summary,
            tiles,
            context,
            empty,
            failed,
        };
        info!(
            "Planned {} tiles ({} empty, {} failed): {} butterfly halves, {} flush edges",
            plan.tiles.len(),
            plan.empty.len(),
            plan.failed.len(),
            plan.butterfly_count(),
            plan.flush_count()
        );
        Ok(plan)
    }

    /// Build every planned tile without writing anything.
    ///
    /// Context tiles are built too, so that both halves of every butterfly
    /// are settled on one scale, but only the planned tiles are returned.
    #[must_use]
    pub fn build_tiles(&self, plan: &TilingPlan) -> Vec<BuiltTile> {
        let grid = &plan.grid;
        let prepared: Vec<PreparedTile> = plan
            .tiles
            .par_iter()
            .chain(plan.context.par_iter())
            .map(|tile| self.prepare_tile(tile))
            .collect();

        let mut finished = self.settle_connectors(grid, &prepared);

        prepared
            .into_iter()
            .take(plan.tiles.len())
            .map(|tile| {
                let mut built = tile.built;
                let Some((model, connectors, warnings)) = finished.remove(&built.id) else {
                    return built;
                };
                for warning in &warnings {
                    warn!("Tile {}: {warning}", built.id);
                }
                debug!(
                    "Tile {}: {} holes, {} butterflies, {} warnings",
                    built.id,
                    built.holes.len(),
                    connectors.iter().filter(|c| c.scale.is_some()).count(),
                    built.warnings.len() + warnings.len()
                );
                built.solid = Some(model.into_solid());
                built.connectors = connectors;
                built.warnings.extend(warnings);
                built
            })
            .collect()
    }

    /// Build and export every planned tile into `out_dir`.
    ///
    /// # Errors
    ///
    /// [`TileError::OutputDir`] if the directory cannot be created. Tile
    /// failures are reported, not returned.
    pub fn process(&self, plan: &TilingPlan, out_dir: &Path) -> TileResult<RunReport> {
        std::fs::create_dir_all(out_dir).map_err(|source| TileError::OutputDir {
            path: out_dir.to_path_buf(),
            source,
        })?;

        let results: Vec<(BuiltTile, Option<Result<PathBuf, TileWarning>>)> = self
            .build_tiles(plan)
            .into_par_iter()
            .map(|built| {
                let export = built
                    .solid
                    .as_ref()
                    .map(|solid| export_tile(solid, built.id, out_dir, &self.config.export));
                (built, export)
            })
            .collect();

        let mut report = RunReport {
            columns: plan.grid.columns(),
            rows: plan.grid.rows(),
            scale_denominator: self.config.scale_denominator,
            written: Vec::with_capacity(results.len()),
            empty: plan.empty.clone(),
            degraded: Vec::new(),
        };

        for (built, export) in results {
            let mut warnings = built.warnings.clone();
            let mut exported = false;
            match export {
                Some(Ok(path)) => {
                    exported = true;
                    report.written.push(TileSummary {
                        id: built.id,
                        path,
                        footprint_area: built.footprint.area(),
                        covered_area: built.covered_area,
                        volume: built.solid.as_ref().map_or(0.0, IndexedMesh::volume),
                        triangles: built.solid.as_ref().map_or(0, |s| s.faces.len()),
                        holes: built.holes.len(),
                        butterflies: built.butterflies(),
                        column_volume: built.profile.column_volume(),
                    });
                }
                Some(Err(warning)) => {
                    warn!("Tile {}: {warning}", built.id);
                    warnings.push(warning);
                }
                None => {}
            }
            if !warnings.is_empty() {
                report.degraded.push(DegradedTile {
                    id: built.id,
                    warnings,
                    exported,
                });
            }
        }
        for (id, reason) in &plan.failed {
            report.degraded.push(DegradedTile {
                id: *id,
                warnings: vec![TileWarning::SolidFailed { reason: reason.clone() }],
                exported: false,
            });
        }
        report.degraded.sort_by_key(|d| d.id);

        info!(
            "Wrote {} tiles to {} ({} degraded, {} empty)",
            report.written.len(),
            out_dir.display(),
            report.degraded.len(),
            report.empty.len()
        );
        Ok(report)
    }

    /// Agree on every butterfly and build the agreed connectors.
    ///
    /// An agreed half that fails to build falls back on both sides of its
    /// edge, and both tiles are rebuilt from their prepared models, until
    /// every tile builds.
    fn settle_connectors(&self, grid: &Grid, prepared: &[PreparedTile]) -> BTreeMap<CellId, SettledTile> {
        let config = &self.config;
        let offers: BTreeMap<CellId, [EdgePlan; 4]> = prepared
            .par_iter()
            .filter_map(|tile| {
                let model = tile.model.as_ref()?;
                Some((
                    tile.built.id,
                    offer_edges(model, grid, &tile.specs, &config.connectors, &config.holes),
                ))
            })
            .collect();
        let mut agreed = agree_edges(grid, &offers);

        let mut finished = BTreeMap::new();
        let mut pending: Vec<&PreparedTile> = prepared.iter().filter(|t| t.model.is_some()).collect();
        while !pending.is_empty() {
            let attempts: Vec<_> = pending
                .par_iter()
                .filter_map(|tile| {
                    let mut model = tile.model.clone()?;
                    let plans = agreed.get(&tile.built.id)?;
                    let attempt = attach_connectors(
                        &mut model,
                        grid,
                        &tile.specs,
                        plans,
                        &config.connectors,
                        &config.holes,
                    )
                    .map(|(placed, warnings)| (model, placed, warnings));
                    Some((tile.built.id, attempt))
                })
                .collect();

            let mut retry = BTreeSet::new();
            for (id, attempt) in attempts {
                let (edge, reason) = match attempt {
                    Ok(done) => {
                        finished.insert(id, done);
                        continue;
                    }
                    Err(failure) => failure,
                };
                debug!("Tile {id}: agreed butterfly on {edge} failed: {reason}");
                let Some(plans) = agreed.get_mut(&id) else {
                    continue;
                };
                let next = fall_back(&plans[edge.index()], reason, &config.connectors);
                plans[edge.index()] = next.clone();
                retry.insert(id);

                let partner = grid.neighbor(id, edge).filter(|p| agreed.contains_key(p));
                if let Some(partner) = partner {
                    let theirs = match next {
                        EdgePlan::Skipped { .. } => EdgePlan::Skipped {
                            reason: BuildError::PartnerRejected { cell: id },
                        },
                        other => other,
                    };
                    if let Some(plans) = agreed.get_mut(&partner) {
                        plans[edge.opposite().index()] = theirs;
                    }
                    retry.insert(partner);
                }
            }
            pending = prepared.iter().filter(|t| retry.contains(&t.built.id)).collect();
        }
        finished
    }

    fn prepare_tile(&self, planned: &PlannedTile) -> PreparedTile {
        let config = &self.config;
        let cell = &planned.cell;
        let anchor_z = config.anchor_z;
        let mut warnings = Vec::new();

        let (profile, profile_warnings) =
            UndersideProfile::sample(&planned.patch.mesh, &cell.footprint, &config.underside, anchor_z);
        warnings.extend(profile_warnings);

        let floor = anchor_z + config.underside.min_surface_clearance;
        let mut source = planned.source.clone();
        let mut patch = planned.patch.clone();
        clamp_surface(&mut source, floor);
        let count = clamp_surface(&mut patch.mesh, floor);
        if count > 0 {
            warn!("Tile {}: {count} surface vertices clamped to z={floor:.4}", cell.id);
            warnings.push(TileWarning::SurfaceClamped { count, floor });
        }
        let covered_area = patch.covered_area();

        let mut built = BuiltTile {
            id: cell.id,
            footprint: cell.footprint,
            solid: None,
            covered_area,
            profile,
            holes: Vec::new(),
            connectors: Vec::new(),
            warnings: Vec::new(),
        };

        let mut model = match TileModel::build(cell, source, patch, anchor_z) {
            Ok(model) => model,
            Err(reason) => {
                warn!("Tile {}: base solid failed: {reason}", cell.id);
                warnings.push(TileWarning::SolidFailed { reason });
                built.warnings = warnings;
                return PreparedTile {
                    built,
                    model: None,
                    specs: planned.connectors,
                };
            }
        };

        let (holes, hole_warnings) = carve_holes(&mut model, &config.holes);
        warnings.extend(hole_warnings);
        built.holes = holes;
        built.warnings = warnings;
        PreparedTile {
            built,
            model: Some(model),
            specs: planned.connectors,
        }
    }
}

/// Finished model with its connectors and their warnings.
type SettledTile = (TileModel, Vec<PlacedConnector>, Vec<TileWarning>);

/// A tile with its base solid and holes, waiting for connectors.
struct PreparedTile {
    built: BuiltTile,
    model: Option<TileModel>,
    specs: [ConnectorSpec; 4],
}
