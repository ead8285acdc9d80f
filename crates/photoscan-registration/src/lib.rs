#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

use glam::DMat4;
use photoscan_3d::pointcloud::PointCloud;

mod error;
pub use error::RegistrationError;

/// Point to point ICP with scaling.
pub mod icp;

/// Similarity estimation and registration scoring.
pub mod ops;

/// Per-pair alignment pipeline and input validation.
pub mod pipeline;

/// RANSAC over FPFH feature matches.
pub mod ransac;

pub use icp::{FineAligner, IcpConvergenceCriteria};
pub use ransac::{CoarseAligner, RansacParams};

/// Result of a registration stage.
///
/// The transformation maps the source frame onto the target frame.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// Estimated similarity transform.
    pub transformation: DMat4,
    /// Ratio of source points with a target point within the inlier distance.
    pub fitness: f64,
    /// Root mean square distance of the inlier pairs.
    pub inlier_rmse: f64,
    /// The number of iterations performed.
    pub num_iterations: usize,
}

/// A registration stage estimating the transform from a source to a target point cloud.
pub trait Registration {
    /// Register `source` onto `target`, starting from the `init` transform.
    fn register(
        &self,
        source: &PointCloud,
        target: &PointCloud,
        init: &DMat4,
    ) -> Result<RegistrationResult, RegistrationError>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use approx::assert_relative_eq;
    use glam::DMat4;
    use photoscan_3d::{mesh::TriangleMesh, pointcloud::PointCloud};
    use rand::{rngs::StdRng, SeedableRng};

    /// Element-wise comparison of two transforms.
    pub fn assert_mat4_eq(a: &DMat4, b: &DMat4, epsilon: f64) {
        for j in 0..4 {
            for i in 0..4 {
                assert_relative_eq!(a.col(j)[i], b.col(j)[i], epsilon = epsilon);
            }
        }
    }

    /// A closed, irregular surface: a UV sphere with a radius modulated by low frequency waves.
    pub fn bumpy_sphere_mesh() -> TriangleMesh {
        let (n_lat, n_lon) = (40, 80);
        let radius = |theta: f64, phi: f64| {
            1.0 + 0.15 * (3.0 * theta).sin() * (2.0 * phi).cos() + 0.1 * (5.0 * phi + 0.3).sin()
        };

        let mut vertices = vec![[0.0, 0.0, radius(0.0, 0.0)]];
        for i in 1..n_lat {
            let theta = std::f64::consts::PI * i as f64 / n_lat as f64;
            for j in 0..n_lon {
                let phi = 2.0 * std::f64::consts::PI * j as f64 / n_lon as f64;
                let r = radius(theta, phi);
                vertices.push([
                    r * theta.sin() * phi.cos(),
                    0.8 * r * theta.sin() * phi.sin(),
                    r * theta.cos(),
                ]);
            }
        }
        let south = vertices.len();
        vertices.push([0.0, 0.0, -radius(std::f64::consts::PI, 0.0)]);

        let ring = |i: usize, j: usize| 1 + (i - 1) * n_lon + j % n_lon;
        let mut triangles = Vec::new();
        for j in 0..n_lon {
            triangles.push([0, ring(1, j), ring(1, j + 1)]);
            triangles.push([south, ring(n_lat - 1, j + 1), ring(n_lat - 1, j)]);
        }
        for i in 1..n_lat - 1 {
            for j in 0..n_lon {
                triangles.push([ring(i, j), ring(i + 1, j), ring(i + 1, j + 1)]);
                triangles.push([ring(i, j), ring(i + 1, j + 1), ring(i, j + 1)]);
            }
        }

        TriangleMesh {
            vertices,
            triangles,
        }
    }

    pub fn bumpy_sphere_cloud(num_points: usize, seed: u64) -> PointCloud {
        bumpy_sphere_mesh()
            .sample_points_uniformly(num_points, &mut StdRng::seed_from_u64(seed))
            .unwrap_or_default()
    }
}
