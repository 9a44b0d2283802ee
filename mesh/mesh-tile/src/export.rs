//! Tile exporter.

use std::path::{Path, PathBuf};

use mesh_io::{save_stl, IoError};
use mesh_types::IndexedMesh;
use tracing::debug;

use crate::config::ExportConfig;
use crate::error::TileWarning;
use crate::grid::CellId;

/// File name of tile `id`.
///
/// # Example
///
/// ```
/// use mesh_tile::{tile_file_name, CellId};
///
/// assert_eq!(tile_file_name(CellId::new(3, 12)), "tile_3_12.stl");
/// ```
#[must_use]
pub fn tile_file_name(id: CellId) -> String {
    format!("tile_{}_{}.stl", id.col, id.row)
}

/// Write the solid of tile `id` into `dir`.
///
/// # Errors
///
/// [`TileWarning::ExportRefused`] when the file exists and overwriting is
/// off, [`TileWarning::ExportFailed`] for any other write failure.
pub fn export_tile(solid: &IndexedMesh, id: CellId, dir: &Path, config: &ExportConfig) -> Result<PathBuf, TileWarning> {
    let path = dir.join(tile_file_name(id));
    match save_stl(solid, &path, config.format.into(), config.overwrite) {
        Ok(()) => {
            debug!("Tile {id}: wrote {} faces to {}", solid.faces.len(), path.display());
            Ok(path)
        }
        Err(IoError::AlreadyExists { path }) => Err(TileWarning::ExportRefused { path }),
        Err(e) => Err(TileWarning::ExportFailed { reason: e.to_string() }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StlFormat;
    use mesh_types::{axis_box, Point3};

    fn cube() -> IndexedMesh {
        axis_box(Point3::origin(), Point3::new(0.2, 0.2, 0.03))
    }

    #[test]
    fn existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let id = CellId::new(1, 2);
        let path = export_tile(&cube(), id, dir.path(), &ExportConfig::default()).unwrap();
        assert_eq!(path, dir.path().join("tile_1_2.stl"));
        let first = std::fs::read(&path).unwrap();
        assert_eq!(first.len(), 84 + 12 * 50);

        let bigger = axis_box(Point3::origin(), Point3::new(0.4, 0.2, 0.03));
        let refused = export_tile(&bigger, id, dir.path(), &ExportConfig::default());
        assert_eq!(refused, Err(TileWarning::ExportRefused { path: path.clone() }));
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn overwrite_replaces_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            format: StlFormat::Ascii,
            overwrite: true,
        };
        let id = CellId::new(0, 0);
        export_tile(&cube(), id, dir.path(), &config).unwrap();
        let path = export_tile(&cube(), id, dir.path(), &config).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("solid"));
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = export_tile(&cube(), CellId::new(0, 0), &missing, &ExportConfig::default());
        assert!(matches!(result, Err(TileWarning::ExportFailed { .. })));
    }
}
