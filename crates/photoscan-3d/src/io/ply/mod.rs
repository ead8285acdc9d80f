mod parser;
mod properties;

pub use parser::*;
pub use properties::*;

use crate::mesh::MeshError;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read PLY file
    #[error("Failed to read PLY file")]
    Io(#[from] std::io::Error),

    /// The header is malformed
    #[error("Invalid PLY header: {0}")]
    InvalidHeader(String),

    /// Unsupported PLY storage format
    #[error("Unsupported PLY format: {0}")]
    UnsupportedFormat(String),

    /// Unsupported PLY property type
    #[error("Unsupported PLY property type: {0}")]
    UnsupportedProperty(String),

    /// The vertex element lacks a coordinate property
    #[error("PLY vertex element has no '{0}' property")]
    MissingVertexProperty(&'static str),

    /// The body does not match the header
    #[error("Invalid PLY data: {0}")]
    InvalidData(String),

    /// The faces do not describe a valid mesh
    #[error(transparent)]
    Mesh(#[from] MeshError),
}
