use std::path::Path;

use crate::mesh::TriangleMesh;

/// OBJ reader module.
pub mod obj;

/// PLY reader module.
pub mod ply;

/// Error types for the mesh readers.
#[derive(Debug, thiserror::Error)]
pub enum MeshIoError {
    /// The file extension does not match a supported format
    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    /// Failed to read a PLY file
    #[error(transparent)]
    Ply(#[from] ply::PlyError),

    /// Failed to read an OBJ file
    #[error(transparent)]
    Obj(#[from] obj::ObjError),
}

/// Read a triangle mesh, picking the reader from the file extension (case insensitive).
///
/// Supported extensions are `ply` and `obj`.
pub fn read_triangle_mesh(path: impl AsRef<Path>) -> Result<TriangleMesh, MeshIoError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "ply" => Ok(ply::read_ply_mesh(path)?),
        "obj" => Ok(obj::read_obj_mesh(path)?),
        _ => Err(MeshIoError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_triangle_mesh_dispatch() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;

        let obj_path = dir.path().join("tri.OBJ");
        let mut file = std::fs::File::create(&obj_path)?;
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3")?;
        let mesh = read_triangle_mesh(&obj_path)?;
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);

        let stl_path = dir.path().join("tri.stl");
        std::fs::write(&stl_path, b"solid")?;
        assert!(matches!(
            read_triangle_mesh(&stl_path),
            Err(MeshIoError::UnsupportedFormat(_))
        ));
        Ok(())
    }
}
