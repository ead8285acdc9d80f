use glam::DVec3;
use rand::Rng;

use crate::pointcloud::PointCloud;

/// Error types for mesh operations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MeshError {
    /// The mesh has no triangle to sample from.
    #[error("Mesh has no triangles")]
    NoTriangles,

    /// All triangles of the mesh are degenerate.
    #[error("Mesh has zero surface area")]
    ZeroArea,

    /// A triangle references a vertex that does not exist.
    #[error("Triangle {triangle} references vertex {vertex} but the mesh has {num_vertices} vertices")]
    InvalidVertexIndex {
        /// Index of the offending triangle.
        triangle: usize,
        /// The out of range vertex index.
        vertex: usize,
        /// Number of vertices of the mesh.
        num_vertices: usize,
    },
}

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// The vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// The triangles as triplets of vertex indices.
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Create a new mesh, checking that every triangle references existing vertices.
    pub fn new(vertices: Vec<[f64; 3]>, triangles: Vec<[usize; 3]>) -> Result<Self, MeshError> {
        for (triangle, indices) in triangles.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|&&v| v >= vertices.len()) {
                return Err(MeshError::InvalidVertexIndex {
                    triangle,
                    vertex,
                    num_vertices: vertices.len(),
                });
            }
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    fn corners(&self, triangle: &[usize; 3]) -> [DVec3; 3] {
        triangle.map(|i| DVec3::from_array(self.vertices[i]))
    }

    /// Area of every triangle, in triangle order.
    pub fn triangle_areas(&self) -> Vec<f64> {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.corners(t);
                0.5 * (b - a).cross(c - a).length()
            })
            .collect()
    }

    /// Total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangle_areas().iter().sum()
    }

    /// Sample points uniformly on the surface of the mesh.
    ///
    /// A triangle is picked with probability proportional to its area, then a point is drawn
    /// uniformly inside it from barycentric coordinates. The returned cloud has no normals.
    ///
    /// # Arguments
    ///
    /// * `num_points` - The number of points to draw.
    /// * `rng` - The random generator, seed it for reproducible sampling.
    pub fn sample_points_uniformly<R: Rng + ?Sized>(
        &self,
        num_points: usize,
        rng: &mut R,
    ) -> Result<PointCloud, MeshError> {
        if self.triangles.is_empty() {
            return Err(MeshError::NoTriangles);
        }

        let mut cumulative = self.triangle_areas();
        let mut acc = 0.0;
        for area in cumulative.iter_mut() {
            acc += *area;
            *area = acc;
        }
        if acc <= 0.0 {
            return Err(MeshError::ZeroArea);
        }

        let points = (0..num_points)
            .map(|_| {
                let target = rng.random_range(0.0..acc);
                let tidx = cumulative
                    .partition_point(|&c| c <= target)
                    .min(self.triangles.len() - 1);
                let [a, b, c] = self.corners(&self.triangles[tidx]);

                let mut r1: f64 = rng.random();
                let mut r2: f64 = rng.random();
                if r1 + r2 > 1.0 {
                    r1 = 1.0 - r1;
                    r2 = 1.0 - r2;
                }
                (a + (b - a) * r1 + (c - a) * r2).to_array()
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Sampled {} points on a mesh of {} triangles (area {:.6})",
            points.len(),
            self.triangles.len(),
            acc
        );

        Ok(PointCloud::new(points, None))
    }
}
