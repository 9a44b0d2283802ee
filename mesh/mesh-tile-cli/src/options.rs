//! Configuration flags shared by the subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mesh_tile::{CellId, StlFormat, TilingConfig};

/// Tiling parameters. Flags override values read from `--config`.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// JSON file holding a full or partial tiling configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Tile edge length in meters
    #[arg(long)]
    pub tile_size: Option<f64>,

    /// Distance from the tile edges to the magnet shaft centers, in meters
    #[arg(long)]
    pub inset: Option<f64>,

    /// Underside column step in meters
    #[arg(long)]
    pub quantization: Option<f64>,

    /// Write ASCII STL instead of binary
    #[arg(long)]
    pub ascii: bool,

    /// Replace existing tile files
    #[arg(long)]
    pub overwrite: bool,

    /// Process a single tile, given as `col,row`
    #[arg(long, value_parser = parse_cell)]
    pub only: Option<CellId>,
}

impl ConfigArgs {
    /// Build the configuration: defaults, then the JSON file, then flags.
    pub fn resolve(&self) -> Result<TilingConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<TilingConfig>(&text)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => TilingConfig::default(),
        };

        if let Some(size) = self.tile_size {
            config = config.with_tile_size(size);
        }
        if let Some(inset) = self.inset {
            config = config.with_edge_inset(inset);
        }
        if let Some(step) = self.quantization {
            config = config.with_quantization_step(step);
        }
        if self.ascii {
            config = config.with_format(StlFormat::Ascii);
        }
        if self.overwrite {
            config = config.with_overwrite(true);
        }
        if self.only.is_some() {
            config = config.with_only(self.only);
        }
        Ok(config)
    }
}

/// Parse `col,row`.
pub fn parse_cell(text: &str) -> Result<CellId, String> {
    let (col, row) = text
        .split_once(',')
        .ok_or_else(|| format!("expected col,row but got {text:?}"))?;
    let col = col.trim().parse().map_err(|e| format!("bad column {col:?}: {e}"))?;
    let row = row.trim().parse().map_err(|e| format!("bad row {row:?}: {e}"))?;
    Ok(CellId::new(col, row))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cell_is_parsed() {
        assert_eq!(parse_cell("3,12"), Ok(CellId::new(3, 12)));
        assert_eq!(parse_cell(" 0 , 4 "), Ok(CellId::new(0, 4)));
        assert!(parse_cell("3").is_err());
        assert!(parse_cell("-1,2").is_err());
    }

    #[test]
    fn defaults_without_flags() {
        let config = ConfigArgs::default().resolve().unwrap();
        assert_eq!(config, TilingConfig::default());
    }

    #[test]
    fn flags_override_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "tile_size": 0.25, "scale_denominator": 500 }}"#).unwrap();

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            tile_size: Some(0.3),
            inset: Some(0.01),
            ascii: true,
            only: Some(CellId::new(1, 1)),
            ..ConfigArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.tile_size, 0.3);
        assert_eq!(config.scale_denominator, 500);
        assert_eq!(config.holes.edge_inset, 0.01);
        assert_eq!(config.export.format, StlFormat::Ascii);
        assert!(!config.export.overwrite);
        assert_eq!(config.only, Some(CellId::new(1, 1)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "tile_sise": 0.25 }}"#).unwrap();
        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            ..ConfigArgs::default()
        };
        assert!(args.resolve().is_err());
    }
}
