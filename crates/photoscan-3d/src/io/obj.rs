use std::io::BufRead;
use std::path::Path;

use crate::mesh::{MeshError, TriangleMesh};

/// Error types for the OBJ module.
#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    /// Failed to read OBJ file
    #[error("Failed to read OBJ file")]
    Io(#[from] std::io::Error),

    /// A statement could not be parsed
    #[error("Invalid OBJ statement at line {line}: {reason}")]
    InvalidStatement {
        /// One-based line number.
        line: usize,
        /// What is wrong with the statement.
        reason: String,
    },

    /// The faces do not describe a valid mesh
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Resolve a face corner (`v`, `v/vt`, `v//vn` or `v/vt/vn`) to a zero-based vertex index.
///
/// Negative indices are relative to the vertices read so far.
fn parse_corner(token: &str, num_vertices: usize) -> Option<usize> {
    let index: i64 = token.split('/').next()?.parse().ok()?;
    match index {
        i if i > 0 => Some(i as usize - 1),
        i if i < 0 => num_vertices.checked_sub(i.unsigned_abs() as usize),
        _ => None,
    }
}

/// Read a triangle mesh from a Wavefront OBJ file.
///
/// Only `v` and `f` statements are used; polygons are triangulated as fans. Texture
/// coordinates, normals, groups and materials are ignored.
pub fn read_obj_mesh(path: impl AsRef<Path>) -> Result<TriangleMesh, ObjError> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);

    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let invalid = |reason: &str| ObjError::InvalidStatement {
            line: i + 1,
            reason: reason.to_string(),
        };

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords = tokens
                    .take(3)
                    .map(|t| t.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| invalid("bad vertex coordinate"))?;
                if coords.len() != 3 {
                    return Err(invalid("vertex needs 3 coordinates"));
                }
                vertices.push([coords[0], coords[1], coords[2]]);
            }
            Some("f") => {
                let corners = tokens
                    .map(|t| parse_corner(t, vertices.len()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| invalid("bad face index"))?;
                if corners.len() < 3 {
                    return Err(invalid("face needs at least 3 vertices"));
                }
                for k in 1..corners.len() - 1 {
                    triangles.push([corners[0], corners[k], corners[k + 1]]);
                }
            }
            _ => {}
        }
    }

    log::debug!(
        "Read OBJ mesh with {} vertices and {} triangles",
        vertices.len(),
        triangles.len()
    );

    Ok(TriangleMesh::new(vertices, triangles)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_corner() {
        assert_eq!(parse_corner("3", 5), Some(2));
        assert_eq!(parse_corner("3/1/2", 5), Some(2));
        assert_eq!(parse_corner("4//1", 5), Some(3));
        assert_eq!(parse_corner("-1", 5), Some(4));
        assert_eq!(parse_corner("0", 5), None);
        assert_eq!(parse_corner("-6", 5), None);
    }

    #[test]
    fn test_read_obj_quad() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            "# quad\no quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\nvt 0 0\nusemtl none\nf 1/1/1 2/1/1 3/1/1 4/1/1"
        )?;

        let mesh = read_obj_mesh(file.path())?;
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3]]);
        Ok(())
    }

    #[test]
    fn test_read_obj_negative_indices() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1")?;
        let mesh = read_obj_mesh(file.path())?;
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        Ok(())
    }

    #[test]
    fn test_read_obj_invalid_statement() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "v 0 0 0\nv 1 zero 0")?;
        assert!(matches!(
            read_obj_mesh(file.path()),
            Err(ObjError::InvalidStatement { line: 2, .. })
        ));
        Ok(())
    }
}
