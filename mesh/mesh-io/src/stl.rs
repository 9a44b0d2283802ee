//! STL (Stereolithography) file format support.
//!
//! Supports both ASCII and binary STL formats.
//!
//! # Format Detection
//!
//! The reader decides between ASCII and binary as follows:
//! - a buffer whose length is exactly `84 + 50 * n` for the face count `n`
//!   stored at offset 80 is binary, even if the header starts with "solid"
//! - otherwise a buffer starting with "solid" (after optional whitespace) is ASCII
//! - anything else is parsed as binary and rejected if truncated
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (0)
//! end
//! ```
//!
//! # Determinism
//!
//! Writers emit a fixed header, faces in mesh order, and normals computed from
//! the face winding. Writing the same mesh twice yields identical bytes.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Point3, Vertex};

use crate::error::{IoError, IoResult};
use crate::StlEncoding;

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

/// Header text written into every binary STL.
const HEADER_TEXT: &[u8] = b"binary STL written by city-tiler mesh-io";

/// Solid name used by the ASCII writer.
const SOLID_NAME: &str = "tile";

/// Load a mesh from an STL file.
///
/// Automatically detects ASCII vs binary format. The result is triangle soup:
/// every face has its own three vertices.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] if the path does not exist, or a parse
/// error if the content is not valid STL.
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_stl;
///
/// let mesh = load_stl("city.stl").unwrap();
/// println!("Loaded {} faces", mesh.faces.len());
/// ```
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            IoError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Io(e)
        }
    })?;
    read_stl(BufReader::new(file))
}

/// Read an STL mesh from any reader.
///
/// # Errors
///
/// Returns an error if reading fails or the content is not valid STL.
pub fn read_stl<R: Read>(mut reader: R) -> IoResult<IndexedMesh> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() < 6 {
        return Err(IoError::invalid_content("file too small to be valid STL"));
    }

    let looks_ascii = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_SIZE)])
        .trim_start()
        .starts_with("solid");

    if looks_ascii && !is_exact_binary_size(&bytes) {
        read_stl_ascii(BufReader::new(&bytes[..]))
    } else {
        read_stl_binary(&bytes)
    }
}

/// Whether the buffer length matches the face count declared in a binary header.
fn is_exact_binary_size(bytes: &[u8]) -> bool {
    declared_face_count(bytes)
        .is_some_and(|count| bytes.len() == HEADER_SIZE + 4 + count as usize * TRIANGLE_SIZE)
}

fn declared_face_count(bytes: &[u8]) -> Option<u32> {
    let raw = bytes.get(HEADER_SIZE..HEADER_SIZE + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Parse a complete binary STL buffer.
fn read_stl_binary(bytes: &[u8]) -> IoResult<IndexedMesh> {
    let face_count = declared_face_count(bytes).ok_or(IoError::InvalidHeader {
        expected: HEADER_SIZE + 4,
        got: bytes.len(),
    })?;

    let body = &bytes[HEADER_SIZE + 4..];
    let complete = body.len() / TRIANGLE_SIZE;
    if complete < face_count as usize {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: complete < face_count, which is a u32
        return Err(IoError::InvalidFaceCount {
            expected: face_count,
            got: complete as u32,
        });
    }

    let mut mesh = IndexedMesh::with_capacity(face_count as usize * 3, face_count as usize);
    for chunk in body.chunks_exact(TRIANGLE_SIZE).take(face_count as usize) {
        // Skip the stored normal; winding defines orientation.
        let base = mesh.push_vertex(read_vertex(&chunk[12..24]));
        mesh.push_vertex(read_vertex(&chunk[24..36]));
        mesh.push_vertex(read_vertex(&chunk[36..48]));
        mesh.faces.push([base, base + 1, base + 2]);
    }

    Ok(mesh)
}

/// Read a vertex from 12 bytes (3 f32s).
fn read_vertex(buf: &[u8]) -> Vertex {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Vertex::from_coords(f64::from(x), f64::from(y), f64::from(z))
}

/// Parse an ASCII STL.
fn read_stl_ascii<R: BufRead>(reader: R) -> IoResult<IndexedMesh> {
    let mut mesh = IndexedMesh::new();
    let mut in_facet = false;
    let mut in_loop = false;
    let mut corners: Vec<Vertex> = Vec::with_capacity(3);

    for line in reader.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "facet" => {
                in_facet = true;
            }
            "outer" => {
                if parts.next().is_some_and(|p| p.eq_ignore_ascii_case("loop")) {
                    in_loop = true;
                    corners.clear();
                }
            }
            "vertex" => {
                if !in_loop {
                    return Err(IoError::invalid_content("vertex outside of a loop"));
                }
                let mut coord = || -> IoResult<f64> {
                    parts
                        .next()
                        .ok_or_else(|| IoError::invalid_content("vertex with missing coordinate"))?
                        .parse::<f64>()
                        .map_err(IoError::from)
                };
                let (x, y, z) = (coord()?, coord()?, coord()?);
                corners.push(Vertex::from_coords(x, y, z));
            }
            "endloop" => {
                in_loop = false;
            }
            "endfacet" => {
                if in_facet && corners.len() == 3 {
                    let base = mesh.push_vertex(corners[0]);
                    mesh.push_vertex(corners[1]);
                    mesh.push_vertex(corners[2]);
                    mesh.faces.push([base, base + 1, base + 2]);
                } else if in_facet {
                    return Err(IoError::invalid_content(format!(
                        "facet with {} vertices",
                        corners.len()
                    )));
                }
                in_facet = false;
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(mesh)
}

/// Save a mesh to an STL file.
///
/// When `overwrite` is false an existing file is left untouched and
/// [`IoError::AlreadyExists`] is returned. The check and the creation are a
/// single atomic open, so concurrent writers cannot both succeed.
///
/// # Errors
///
/// Returns an error if the file exists and `overwrite` is false, or if it
/// cannot be written. A file that fails part way is removed again.
///
/// # Example
///
/// ```no_run
/// use mesh_io::{load_stl, save_stl, StlEncoding};
///
/// let mesh = load_stl("input.stl").unwrap();
/// save_stl(&mesh, "tile_0_0.stl", StlEncoding::Binary, false).unwrap();
/// ```
pub fn save_stl<P: AsRef<Path>>(
    mesh: &IndexedMesh,
    path: P,
    encoding: StlEncoding,
    overwrite: bool,
) -> IoResult<()> {
    let path = path.as_ref();
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let file = options.open(path).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            IoError::AlreadyExists {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Io(e)
        }
    })?;

    let mut writer = BufWriter::new(file);
    let written = write_stl(mesh, &mut writer, encoding).and_then(|()| writer.flush().map_err(IoError::from));
    if written.is_err() {
        drop(writer);
        let _ = std::fs::remove_file(path);
    }
    written
}

/// Write a mesh as STL to any writer.
///
/// # Errors
///
/// Returns an error if writing fails or the mesh has more faces than binary
/// STL can count.
pub fn write_stl<W: Write>(mesh: &IndexedMesh, writer: W, encoding: StlEncoding) -> IoResult<()> {
    match encoding {
        StlEncoding::Binary => write_stl_binary(mesh, writer),
        StlEncoding::Ascii => write_stl_ascii(mesh, writer),
    }
}

fn face_corners(mesh: &IndexedMesh, face: [u32; 3]) -> IoResult<[Point3<f64>; 3]> {
    let corner = |i: u32| {
        mesh.vertices
            .get(i as usize)
            .map(|v| v.position)
            .ok_or_else(|| IoError::invalid_content(format!("face index {i} out of range")))
    };
    Ok([corner(face[0])?, corner(face[1])?, corner(face[2])?])
}

fn unit_normal([v0, v1, v2]: &[Point3<f64>; 3]) -> [f64; 3] {
    let normal = (v1 - v0).cross(&(v2 - v0));
    let len = normal.norm();
    if len > f64::EPSILON {
        [normal.x / len, normal.y / len, normal.z / len]
    } else {
        [0.0; 3]
    }
}

/// Save mesh as binary STL.
fn write_stl_binary<W: Write>(mesh: &IndexedMesh, mut writer: W) -> IoResult<()> {
    let face_count = u32::try_from(mesh.faces.len()).map_err(|_| IoError::TooManyFaces {
        faces: mesh.faces.len(),
    })?;

    let mut header = [b' '; HEADER_SIZE];
    header[..HEADER_TEXT.len()].copy_from_slice(HEADER_TEXT);
    writer.write_all(&header)?;
    writer.write_all(&face_count.to_le_bytes())?;

    for &face in &mesh.faces {
        let corners = face_corners(mesh, face)?;
        write_f32_triple(&mut writer, unit_normal(&corners))?;
        for p in &corners {
            write_f32_triple(&mut writer, [p.x, p.y, p.z])?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

/// Write three coordinates as little-endian f32s.
fn write_f32_triple<W: Write>(writer: &mut W, values: [f64; 3]) -> IoResult<()> {
    for value in values {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: STL stores f32
        writer.write_all(&(value as f32).to_le_bytes())?;
    }
    Ok(())
}

/// Save mesh as ASCII STL.
fn write_stl_ascii<W: Write>(mesh: &IndexedMesh, mut writer: W) -> IoResult<()> {
    writeln!(writer, "solid {SOLID_NAME}")?;

    for &face in &mesh.faces {
        let corners = face_corners(mesh, face)?;
        let [nx, ny, nz] = unit_normal(&corners);
        writeln!(writer, "  facet normal {nx:.6e} {ny:.6e} {nz:.6e}")?;
        writeln!(writer, "    outer loop")?;
        for p in &corners {
            writeln!(writer, "      vertex {:.6e} {:.6e} {:.6e}", p.x, p.y, p.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }

    writeln!(writer, "endsolid {SOLID_NAME}")?;
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::unnecessary_raw_string_hashes
)]
mod tests {
    use super::*;
    use mesh_types::{axis_box, MeshTopology};

    fn create_test_triangle() -> IndexedMesh {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    fn encode(mesh: &IndexedMesh, encoding: StlEncoding) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_stl(mesh, &mut bytes, encoding).unwrap();
        bytes
    }

    #[test]
    fn binary_layout() {
        let bytes = encode(&create_test_triangle(), StlEncoding::Binary);
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + TRIANGLE_SIZE);
        assert!(bytes.starts_with(HEADER_TEXT));
        assert_eq!(declared_face_count(&bytes), Some(1));

        // Normal of a CCW triangle in the XY plane is +Z.
        let nz = f32::from_le_bytes([bytes[92], bytes[93], bytes[94], bytes[95]]);
        assert_eq!(nz, 1.0);
    }

    #[test]
    fn binary_read_back() {
        let original = axis_box(Point3::origin(), Point3::new(0.2, 0.2, 0.025));
        let loaded = read_stl(&encode(&original, StlEncoding::Binary)[..]).unwrap();

        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.vertex_count(), 36);
        assert!((loaded.volume() - original.volume()).abs() < 1e-8);
    }

    #[test]
    fn ascii_read_back() {
        let original = create_test_triangle();
        let bytes = encode(&original, StlEncoding::Ascii);
        assert!(bytes.starts_with(b"solid tile"));

        let loaded = read_stl(&bytes[..]).unwrap();
        assert_eq!(loaded.face_count(), 1);
        let v1 = loaded.vertices[1].position;
        assert!((v1.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn writing_twice_is_identical() {
        let mesh = axis_box(Point3::origin(), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(
            encode(&mesh, StlEncoding::Binary),
            encode(&mesh, StlEncoding::Binary)
        );
        assert_eq!(
            encode(&mesh, StlEncoding::Ascii),
            encode(&mesh, StlEncoding::Ascii)
        );
    }

    #[test]
    fn binary_header_starting_with_solid() {
        let mut bytes = encode(&create_test_triangle(), StlEncoding::Binary);
        bytes[..6].copy_from_slice(b"solid ");
        let loaded = read_stl(&bytes[..]).unwrap();
        assert_eq!(loaded.face_count(), 1);
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let mut bytes = encode(&create_test_triangle(), StlEncoding::Binary);
        bytes[HEADER_SIZE] = 3;
        assert!(matches!(
            read_stl(&bytes[..]),
            Err(IoError::InvalidFaceCount { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn out_of_range_face_is_an_error() {
        let mut mesh = create_test_triangle();
        mesh.faces.push([0, 1, 9]);
        let mut sink = Vec::new();
        assert!(write_stl(&mesh, &mut sink, StlEncoding::Binary).is_err());
    }

    #[test]
    fn load_nonexistent_file() {
        let result = load_stl("nonexistent_file_12345.stl");
        if let Err(IoError::FileNotFound { path }) = result {
            assert!(path.to_string_lossy().contains("nonexistent"));
        } else {
            panic!("expected FileNotFound");
        }
    }

    #[test]
    fn ascii_stl_parsing() {
        let ascii_stl = br#"solid test
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid test"#;

        let mesh = read_stl(&ascii_stl[..]).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn ascii_facet_with_two_vertices_is_rejected() {
        let ascii_stl = b"solid bad\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nendloop\nendfacet\nendsolid bad\n";
        assert!(matches!(
            read_stl(&ascii_stl[..]),
            Err(IoError::InvalidContent { .. })
        ));
    }
}
