//! City tiler
//!
//! Cuts a closed city mesh into square, printable tiles.
//!
//! # Commands
//!
//! - `city-tiler tile <input.stl> --out <dir>` - Write one STL per tile
//! - `city-tiler plan <input.stl>` - Print the grid and connector plan

mod options;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mesh_tile::TilingEngine;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::options::ConfigArgs;

/// Cut a city mesh into printable grid tiles
#[derive(Parser)]
#[command(name = "city-tiler")]
#[command(about = "Cut a closed city mesh into printable grid tiles", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tile a mesh and write one STL per tile
    Tile {
        /// Input STL file
        #[arg(name = "INPUT")]
        input: PathBuf,

        /// Output directory, created if missing
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the grid and connector plan without writing anything
    Plan {
        /// Input STL file
        #[arg(name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Tile { input, out, config } => tile(&input, &out, &config),
        Commands::Plan { input, config } => plan(&input, &config),
    }
}

fn tile(input: &Path, out: &Path, args: &ConfigArgs) -> Result<()> {
    let engine = TilingEngine::new(args.resolve()?).context("invalid tiling configuration")?;
    let report = engine
        .run_stl(input, out)
        .with_context(|| format!("failed to tile {}", input.display()))?;
    println!("{report}");

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{failed} tiles were not written");
    }
    info!("Wrote {} tiles to {}", report.written.len(), out.display());
    Ok(())
}

fn plan(input: &Path, args: &ConfigArgs) -> Result<()> {
    let engine = TilingEngine::new(args.resolve()?).context("invalid tiling configuration")?;
    let mesh = mesh_io::load_stl(input).with_context(|| format!("failed to read {}", input.display()))?;
    let plan = engine
        .plan(mesh)
        .with_context(|| format!("failed to plan {}", input.display()))?;
    println!("{plan}");
    Ok(())
}
