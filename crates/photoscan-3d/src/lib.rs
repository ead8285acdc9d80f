#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Decomposition of similarity transforms into rotation, translation and scale.
pub mod decompose;

/// Local geometric feature descriptors (FPFH).
pub mod features;

/// I/O utilities for reading triangle meshes.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Triangle meshes and uniform surface sampling.
pub mod mesh;

/// Hybrid radius / k-nearest neighbor search.
pub mod neighbors;

/// Surface normal estimation.
pub mod normals;

/// Point cloud type.
pub mod pointcloud;

/// 3D transforms algorithms.
pub mod transforms;

/// Voxel grid downsampling.
pub mod voxel_grid;
