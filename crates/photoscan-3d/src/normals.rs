use glam::{DMat3, DVec3};

use crate::linalg::smallest_eigenvector;
use crate::neighbors::{HybridSearchParams, PointIndex};
use crate::pointcloud::PointCloud;

/// Compute the covariance matrix of a set of points.
fn covariance<'a>(points: impl Iterator<Item = &'a [f64; 3]> + Clone) -> Option<DMat3> {
    let (sum, count) = points
        .clone()
        .fold((DVec3::ZERO, 0usize), |(acc, n), p| {
            (acc + DVec3::from_array(*p), n + 1)
        });
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;

    let mut cov = DMat3::ZERO;
    for p in points {
        let d = DVec3::from_array(*p) - mean;
        cov += DMat3::from_cols(d * d.x, d * d.y, d * d.z);
    }
    Some(cov * (1.0 / count as f64))
}

/// Estimate one unit normal per point from the local neighborhood.
///
/// The normal is the direction of least variance of the hybrid neighborhood of the point
/// (the point itself included). Points with fewer than three neighbors get `(0, 0, 1)`.
/// Normals are flipped to point away from the centroid of the cloud, which gives a
/// deterministic orientation for closed surfaces.
pub fn estimate_normals(point_cloud: &PointCloud, params: &HybridSearchParams) -> Vec<[f64; 3]> {
    let points = point_cloud.points();
    let index = PointIndex::new(points);
    let center = point_cloud.centroid();

    points
        .iter()
        .map(|query| {
            let neighbors = index.search_hybrid(query, params);
            if neighbors.len() < 3 {
                return [0.0, 0.0, 1.0];
            }

            let Some(cov) = covariance(neighbors.iter().map(|n| &points[n.index])) else {
                return [0.0, 0.0, 1.0];
            };

            let mut normal = smallest_eigenvector(&cov).normalize_or(DVec3::Z);
            if normal.dot(DVec3::from_array(*query) - center) < 0.0 {
                normal = -normal;
            }
            normal.to_array()
        })
        .collect()
}

/// Estimate the normals of a point cloud in place.
pub fn compute_normals(point_cloud: &mut PointCloud, params: &HybridSearchParams) {
    let normals = estimate_normals(point_cloud, params);
    log::debug!("Estimated {} normals", normals.len());
    point_cloud.set_normals(normals);
}
