use glam::{DMat3, DMat4, DVec3};

use crate::linalg::transform_points;

/// A point cloud with points and optional normals.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points and normals (optional).
    pub fn new(points: Vec<[f64; 3]>, normals: Option<Vec<[f64; 3]>>) -> Self {
        Self { points, normals }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Check if the point cloud carries one normal per point.
    pub fn has_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|normals| normals.len() == self.points.len())
    }

    /// Replace the normals of the point cloud.
    ///
    /// PRECONDITION: `normals` has the same length as the points.
    pub fn set_normals(&mut self, normals: Vec<[f64; 3]>) {
        assert_eq!(normals.len(), self.points.len());
        self.normals = Some(normals);
    }

    /// Get the centroid of the point cloud. Returns zero if empty.
    pub fn centroid(&self) -> DVec3 {
        if self.points.is_empty() {
            return DVec3::ZERO;
        }
        let sum = self
            .points
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + DVec3::from_array(*p));
        sum / self.points.len() as f64
    }

    /// Get the minimum bound of the point cloud.
    pub fn get_min_bound(&self) -> DVec3 {
        if self.points.is_empty() {
            return DVec3::ZERO;
        }
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .fold(DVec3::splat(f64::INFINITY), |a, b| a.min(b))
    }

    /// Get the maximum bound of the point cloud.
    pub fn get_max_bound(&self) -> DVec3 {
        if self.points.is_empty() {
            return DVec3::ZERO;
        }
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .fold(DVec3::splat(f64::NEG_INFINITY), |a, b| a.max(b))
    }

    /// Return a copy of the point cloud with a homogeneous transform applied.
    ///
    /// Normals are rotated by the linear part of the transform and re-normalized.
    pub fn transformed(&self, transform: &DMat4) -> PointCloud {
        let mut points = vec![[0.0; 3]; self.points.len()];
        transform_points(&self.points, transform, &mut points);

        let normals = self.normals.as_ref().map(|normals| {
            let linear = DMat3::from_mat4(*transform);
            normals
                .iter()
                .map(|n| {
                    (linear * DVec3::from_array(*n))
                        .normalize_or_zero()
                        .to_array()
                })
                .collect()
        });

        PointCloud::new(points, normals)
    }
}
