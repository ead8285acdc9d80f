use std::f64::consts::PI;

use glam::DVec3;

use crate::neighbors::{HybridSearchParams, PointIndex};
use crate::pointcloud::PointCloud;

/// Number of bins of each of the three angular sub-histograms.
pub const FPFH_BINS: usize = 11;

/// Dimension of an FPFH descriptor.
pub const FPFH_DIM: usize = 3 * FPFH_BINS;

/// A 33-dimensional Fast Point Feature Histogram.
pub type FpfhDescriptor = [f64; FPFH_DIM];

/// Error types for the feature extraction.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// The point cloud does not carry one normal per point.
    #[error("FPFH requires a point cloud with normals")]
    MissingNormals,
}

/// Angular relation between two oriented points.
///
/// Returns `(theta, alpha, phi, distance)` in the Darboux frame of the source point. The
/// frame is anchored on the point whose normal makes the smaller angle with the connecting
/// line. Returns all zeros for coincident points or when the frame is degenerate.
pub fn compute_pair_features(p1: DVec3, n1: DVec3, p2: DVec3, n2: DVec3) -> [f64; 4] {
    let mut dp2p1 = p2 - p1;
    let distance = dp2p1.length();
    if distance == 0.0 {
        return [0.0; 4];
    }

    let angle1 = n1.dot(dp2p1) / distance;
    let angle2 = n2.dot(dp2p1) / distance;

    let (n1, n2, phi) = if angle1.abs().acos() > angle2.abs().acos() {
        dp2p1 = -dp2p1;
        (n2, n1, -angle2)
    } else {
        (n1, n2, angle1)
    };

    let v = dp2p1.cross(n1);
    let v_norm = v.length();
    if v_norm == 0.0 {
        return [0.0; 4];
    }
    let v = v / v_norm;
    let w = n1.cross(v);

    let alpha = v.dot(n2);
    let theta = w.dot(n2).atan2(n1.dot(n2));
    [theta, alpha, phi, distance]
}

fn bin_index(value: f64) -> usize {
    (value.floor().max(0.0) as usize).min(FPFH_BINS - 1)
}

/// Simplified point feature histograms, one per point.
fn compute_spfh(
    points: &[[f64; 3]],
    normals: &[[f64; 3]],
    index: &PointIndex,
    params: &HybridSearchParams,
) -> Vec<FpfhDescriptor> {
    points
        .iter()
        .enumerate()
        .map(|(i, query)| {
            let mut feature = [0.0; FPFH_DIM];
            let neighbors = index.search_hybrid(query, params);
            if neighbors.len() <= 1 {
                return feature;
            }

            let hist_incr = 100.0 / (neighbors.len() - 1) as f64;
            let (p1, n1) = (DVec3::from_array(points[i]), DVec3::from_array(normals[i]));

            // the first neighbor is the query point itself
            for nn in neighbors.iter().skip(1) {
                let pf = compute_pair_features(
                    p1,
                    n1,
                    DVec3::from_array(points[nn.index]),
                    DVec3::from_array(normals[nn.index]),
                );

                let theta = FPFH_BINS as f64 * (pf[0] + PI) / (2.0 * PI);
                feature[bin_index(theta)] += hist_incr;

                let alpha = FPFH_BINS as f64 * (pf[1] + 1.0) * 0.5;
                feature[FPFH_BINS + bin_index(alpha)] += hist_incr;

                let phi = FPFH_BINS as f64 * (pf[2] + 1.0) * 0.5;
                feature[2 * FPFH_BINS + bin_index(phi)] += hist_incr;
            }
            feature
        })
        .collect()
}

/// Compute the FPFH descriptor of every point of an oriented point cloud.
///
/// Each descriptor is the point's own simplified histogram plus the histograms of its
/// neighbors weighted by the inverse squared distance, with every sub-histogram of the
/// weighted part normalized to sum to 100.
///
/// # Arguments
///
/// * `point_cloud` - The point cloud, normals are required.
/// * `params` - The neighborhood used for both the simplified and the final histograms.
///
/// # Returns
///
/// One 33-dimensional descriptor per point, in point order.
pub fn compute_fpfh_feature(
    point_cloud: &PointCloud,
    params: &HybridSearchParams,
) -> Result<Vec<FpfhDescriptor>, FeatureError> {
    let normals = point_cloud
        .normals()
        .filter(|_| point_cloud.has_normals())
        .ok_or(FeatureError::MissingNormals)?;
    let points = point_cloud.points();

    let index = PointIndex::new(points);
    let spfh = compute_spfh(points, normals, &index, params);

    let features = points
        .iter()
        .enumerate()
        .map(|(i, query)| {
            let mut feature = [0.0; FPFH_DIM];
            let neighbors = index.search_hybrid(query, params);
            if neighbors.len() <= 1 {
                return feature;
            }

            let mut sums = [0.0; 3];
            for nn in neighbors.iter().skip(1) {
                if nn.distance_sq == 0.0 {
                    continue;
                }
                for (j, value) in feature.iter_mut().enumerate() {
                    let weighted = spfh[nn.index][j] / nn.distance_sq;
                    sums[j / FPFH_BINS] += weighted;
                    *value += weighted;
                }
            }

            for sum in sums.iter_mut() {
                if *sum != 0.0 {
                    *sum = 100.0 / *sum;
                }
            }
            for (j, value) in feature.iter_mut().enumerate() {
                *value = *value * sums[j / FPFH_BINS] + spfh[i][j];
            }
            feature
        })
        .collect::<Vec<_>>();

    log::debug!("Computed {} FPFH descriptors", features.len());

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{DMat4, DQuat};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    // random points on an ellipsoid with its analytic normals
    fn ellipsoid(num_points: usize, seed: u64) -> PointCloud {
        let radii = DVec3::new(1.0, 0.7, 1.3);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::with_capacity(num_points);
        let mut normals = Vec::with_capacity(num_points);
        while points.len() < num_points {
            let d = DVec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            if d.length() < 1e-3 {
                continue;
            }
            let p = d.normalize() * radii;
            let n = (p / (radii * radii)).normalize();
            points.push(p.to_array());
            normals.push(n.to_array());
        }
        PointCloud::new(points, Some(normals))
    }

    #[test]
    fn test_pair_features_coincident_points() {
        let p = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(compute_pair_features(p, DVec3::Z, p, DVec3::Z), [0.0; 4]);
    }

    #[test]
    fn test_pair_features_parallel_normals() {
        let pf = compute_pair_features(DVec3::ZERO, DVec3::Z, DVec3::X, DVec3::Z);
        assert_relative_eq!(pf[0], 0.0);
        assert_relative_eq!(pf[1], 0.0);
        assert_relative_eq!(pf[2], 0.0);
        assert_relative_eq!(pf[3], 1.0);
    }

    #[test]
    fn test_fpfh_requires_normals() {
        let point_cloud = PointCloud::new(vec![[0.0; 3]], None);
        let result = compute_fpfh_feature(&point_cloud, &HybridSearchParams::new(1.0, 10));
        assert!(matches!(result, Err(FeatureError::MissingNormals)));
    }

    #[test]
    fn test_fpfh_histogram_mass() -> Result<(), FeatureError> {
        let point_cloud = ellipsoid(500, 3);
        let features = compute_fpfh_feature(&point_cloud, &HybridSearchParams::new(0.5, 100))?;
        assert_eq!(features.len(), 500);

        for feature in features.iter() {
            for block in feature.chunks(FPFH_BINS) {
                let mass: f64 = block.iter().sum();
                assert_relative_eq!(mass, 200.0, epsilon = 1e-6);
            }
        }
        Ok(())
    }

    #[test]
    fn test_fpfh_rigid_invariance() -> Result<(), FeatureError> {
        let point_cloud = ellipsoid(400, 11);
        let transform = DMat4::from_rotation_translation(
            DQuat::from_rotation_y(0.4) * DQuat::from_rotation_x(-1.1),
            DVec3::new(0.5, -2.0, 1.0),
        );
        let moved = point_cloud.transformed(&transform);

        let params = HybridSearchParams::new(0.35, 100);
        let a = compute_fpfh_feature(&point_cloud, &params)?;
        let b = compute_fpfh_feature(&moved, &params)?;

        for (fa, fb) in a.iter().zip(b.iter()) {
            for (va, vb) in fa.iter().zip(fb.iter()) {
                assert_relative_eq!(va, vb, epsilon = 1e-6);
            }
        }
        Ok(())
    }
}
