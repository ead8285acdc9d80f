use std::path::PathBuf;

use photoscan_3d::{
    decompose::DecomposeError, features::FeatureError, io::MeshIoError, mesh::MeshError,
};

/// Error types for the registration module.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// An input model does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A registration parameter is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A point cloud has no points
    #[error("The {0} point cloud is empty")]
    EmptyPointCloud(&'static str),

    /// Not enough correspondences to estimate a transform
    #[error("Not enough correspondences: required {required}, got {actual}")]
    NotEnoughCorrespondences {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences found.
        actual: usize,
    },

    /// Failed to read a model
    #[error(transparent)]
    MeshIo(#[from] MeshIoError),

    /// Failed to sample a model
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Failed to compute the point features
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// The estimated transform is not a similarity
    #[error(transparent)]
    Decompose(#[from] DecomposeError),
}
