//! STL file I/O for tiling city meshes.
//!
//! This crate loads and saves triangle meshes as STL, binary or ASCII.
//! Loading yields triangle soup (three vertices per face); run it through
//! `mesh-repair` to weld it back into an indexed solid.
//!
//! Output is deterministic: a fixed header, faces in mesh order and normals
//! derived from winding, so the same mesh always produces the same bytes.
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{load_stl, save_stl, StlEncoding};
//!
//! // Load a mesh
//! let mesh = load_stl("city.stl").unwrap();
//!
//! // Save it back, refusing to replace an existing file
//! save_stl(&mesh, "copy.stl", StlEncoding::Binary, false).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod stl;

pub use error::{IoError, IoResult};
pub use stl::{load_stl, read_stl, save_stl, write_stl};

use std::path::Path;

/// STL encoding variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StlEncoding {
    /// Binary STL with an 80-byte header.
    #[default]
    Binary,
    /// Human-readable ASCII STL.
    Ascii,
}

impl StlEncoding {
    /// Get the canonical file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        "stl"
    }
}

/// Check that a path carries the `.stl` extension (case-insensitive).
///
/// # Errors
///
/// Returns [`IoError::UnknownFormat`] for any other extension.
pub fn ensure_stl_path<P: AsRef<Path>>(path: P) -> IoResult<()> {
    let extension = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("(none)");
    if extension.eq_ignore_ascii_case("stl") {
        Ok(())
    } else {
        Err(IoError::UnknownFormat {
            extension: extension.to_string(),
        })
    }
}
