use glam::{DMat4, DVec3};
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use rand::{rngs::StdRng, SeedableRng};

use photoscan_3d::{
    features::{compute_fpfh_feature, FpfhDescriptor, FPFH_DIM},
    neighbors::{HybridSearchParams, PointIndex},
    normals::compute_normals,
    pointcloud::PointCloud,
    voxel_grid::VoxelGrid,
};

use crate::ops::{
    ensure_positive, estimate_similarity_from_correspondences, evaluate_registration,
    Correspondence, Evaluation,
};
use crate::{Registration, RegistrationError, RegistrationResult};

/// Default voxel size used to downsample the models before the coarse alignment.
pub const DEFAULT_VOXEL_SIZE: f64 = 0.01;

/// Parameters for RANSAC over feature correspondences.
#[derive(Debug, Clone)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Desired probability that at least one sample set is outlier-free.
    pub confidence: f64,
    /// Number of correspondences drawn per iteration.
    pub ransac_n: usize,
    /// Edge length ratio below which a sample is rejected.
    pub similarity_threshold: f64,
    /// Keep only correspondences that are mutual nearest neighbors in feature space.
    pub mutual_filter: bool,
    /// Whether a uniform scale is estimated along with the rigid motion.
    pub with_scaling: bool,
    /// Optional fixed seed for reproducible sampling.
    pub random_seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            confidence: 0.999,
            ransac_n: 3,
            similarity_threshold: 0.1,
            mutual_filter: true,
            with_scaling: true,
            random_seed: None,
        }
    }
}

/// A geometric test run on every sampled correspondence set.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrespondenceChecker {
    /// Rejects the sample when an edge between two source points and the matching edge
    /// between the target points differ in length by more than the given ratio.
    EdgeLength(f64),
    /// Rejects the sample when a transformed source point lands farther than the given
    /// distance from its target point.
    Distance(f64),
}

impl CorrespondenceChecker {
    /// Whether the check needs the candidate transform.
    pub fn requires_alignment(&self) -> bool {
        matches!(self, CorrespondenceChecker::Distance(_))
    }

    /// Run the check on a sample.
    pub fn check(
        &self,
        source: &[[f64; 3]],
        target: &[[f64; 3]],
        sample: &[Correspondence],
        transform: &DMat4,
    ) -> bool {
        match *self {
            CorrespondenceChecker::EdgeLength(similarity) => {
                for (k, &(si, ti)) in sample.iter().enumerate() {
                    for &(sj, tj) in sample.iter().skip(k + 1) {
                        let dis_source =
                            DVec3::from_array(source[si]).distance(DVec3::from_array(source[sj]));
                        let dis_target =
                            DVec3::from_array(target[ti]).distance(DVec3::from_array(target[tj]));
                        if dis_source < dis_target * similarity
                            || dis_target < dis_source * similarity
                        {
                            return false;
                        }
                    }
                }
                true
            }
            CorrespondenceChecker::Distance(max_distance) => {
                sample.iter().all(|&(si, ti)| {
                    let p = transform.transform_point3(DVec3::from_array(source[si]));
                    p.distance(DVec3::from_array(target[ti])) <= max_distance
                })
            }
        }
    }
}

/// Match every source descriptor to its closest target descriptor.
///
/// With `mutual_filter` only pairs that are each other's closest match are kept. When fewer
/// than `min_mutual` of those remain, all the one-way matches are returned instead.
pub fn match_features(
    source_features: &[FpfhDescriptor],
    target_features: &[FpfhDescriptor],
    mutual_filter: bool,
    min_mutual: usize,
) -> Vec<Correspondence> {
    if source_features.is_empty() || target_features.is_empty() {
        return Vec::new();
    }

    let target_tree: ImmutableKdTree<f64, u32, FPFH_DIM, 32> =
        ImmutableKdTree::new_from_slice(target_features);
    let forward = source_features
        .iter()
        .enumerate()
        .map(|(i, f)| (i, target_tree.nearest_one::<SquaredEuclidean>(f).item as usize))
        .collect::<Vec<_>>();

    if !mutual_filter {
        return forward;
    }

    let source_tree: ImmutableKdTree<f64, u32, FPFH_DIM, 32> =
        ImmutableKdTree::new_from_slice(source_features);
    let mutual = forward
        .iter()
        .copied()
        .filter(|&(i, j)| {
            source_tree
                .nearest_one::<SquaredEuclidean>(&target_features[j])
                .item as usize
                == i
        })
        .collect::<Vec<_>>();

    if mutual.len() < min_mutual {
        log::warn!(
            "Too few correspondences after mutual filter ({} < {}), falling back to all {}",
            mutual.len(),
            min_mutual,
            forward.len()
        );
        return forward;
    }
    mutual
}

fn is_better(candidate: &Evaluation, best: &Evaluation) -> bool {
    candidate.fitness > best.fitness
        || (candidate.fitness == best.fitness && candidate.inlier_rmse < best.inlier_rmse)
}

/// Run RANSAC over a set of putative correspondences.
///
/// # Arguments
///
/// * `source` - The source points.
/// * `target` - The target points.
/// * `correspondences` - The putative correspondences, typically feature matches.
/// * `max_correspondence_distance` - Inlier distance used to score the candidates.
/// * `checkers` - Tests that reject a sample before it is scored.
/// * `params` - RANSAC parameters.
///
/// # Returns
///
/// The best transform found. The iteration budget shrinks as better candidates are found,
/// following `log(1 - confidence) / log(1 - fitness^n)`.
pub fn ransac_on_correspondences(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    correspondences: &[Correspondence],
    max_correspondence_distance: f64,
    checkers: &[CorrespondenceChecker],
    params: &RansacParams,
) -> Result<RegistrationResult, RegistrationError> {
    let ransac_n = params.ransac_n.max(3);
    if correspondences.len() < ransac_n {
        return Err(RegistrationError::NotEnoughCorrespondences {
            required: ransac_n,
            actual: correspondences.len(),
        });
    }
    if !(0.0..1.0).contains(&params.confidence) {
        return Err(RegistrationError::InvalidParameter(format!(
            "confidence must be in [0, 1), got {}",
            params.confidence
        )));
    }

    let mut rng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let target_index = PointIndex::new(target);

    let mut best_transform = DMat4::IDENTITY;
    let mut best = Evaluation::default();
    let mut required_iterations = params.max_iterations;
    let mut num_iterations = 0;
    let mut sample = Vec::with_capacity(ransac_n);

    while num_iterations < required_iterations {
        num_iterations += 1;

        sample.clear();
        sample.extend(
            rand::seq::index::sample(&mut rng, correspondences.len(), ransac_n)
                .iter()
                .map(|k| correspondences[k]),
        );

        if !checkers
            .iter()
            .filter(|c| !c.requires_alignment())
            .all(|c| c.check(source, target, &sample, &DMat4::IDENTITY))
        {
            continue;
        }

        let Some(transform) =
            estimate_similarity_from_correspondences(source, target, &sample, params.with_scaling)
        else {
            continue;
        };

        if !checkers
            .iter()
            .filter(|c| c.requires_alignment())
            .all(|c| c.check(source, target, &sample, &transform))
        {
            continue;
        }

        let evaluation =
            evaluate_registration(source, &target_index, &transform, max_correspondence_distance);
        if !is_better(&evaluation, &best) {
            continue;
        }

        best = evaluation;
        best_transform = transform;

        if best.fitness >= 1.0 {
            required_iterations = num_iterations;
        } else if best.fitness > 0.0 {
            let estimate = (1.0 - params.confidence).ln()
                / (1.0 - best.fitness.powi(ransac_n as i32)).ln();
            required_iterations = required_iterations.min(estimate.ceil() as usize);
        }

        log::debug!(
            "RANSAC iteration {}: fitness {:.6}, rmse {:.6}, budget {}",
            num_iterations,
            best.fitness,
            best.inlier_rmse,
            required_iterations
        );
    }

    log::info!(
        "RANSAC finished after {} iterations: fitness {:.6}, rmse {:.6}",
        num_iterations,
        best.fitness,
        best.inlier_rmse
    );

    Ok(RegistrationResult {
        transformation: best_transform,
        fitness: best.fitness,
        inlier_rmse: best.inlier_rmse,
        num_iterations,
    })
}

/// Register two downsampled point clouds from their feature descriptors.
///
/// Features are matched (optionally with the mutual filter) and the matches are fed to RANSAC
/// with an edge length checker and a distance checker.
pub fn ransac_on_feature_matching(
    source: &PointCloud,
    target: &PointCloud,
    source_features: &[FpfhDescriptor],
    target_features: &[FpfhDescriptor],
    max_correspondence_distance: f64,
    params: &RansacParams,
) -> Result<RegistrationResult, RegistrationError> {
    let correspondences = match_features(
        source_features,
        target_features,
        params.mutual_filter,
        3 * params.ransac_n,
    );
    log::debug!("{} feature correspondences", correspondences.len());

    let checkers = [
        CorrespondenceChecker::EdgeLength(params.similarity_threshold),
        CorrespondenceChecker::Distance(max_correspondence_distance),
    ];

    ransac_on_correspondences(
        source.points(),
        target.points(),
        &correspondences,
        max_correspondence_distance,
        &checkers,
        params,
    )
}

/// Downsample, estimate normals and compute the FPFH descriptors of a point cloud.
///
/// Normals use a radius of twice the voxel size capped to 30 neighbors, descriptors a radius
/// of five times the voxel size capped to 100 neighbors.
pub fn preprocess_point_cloud(
    point_cloud: &PointCloud,
    voxel_size: f64,
) -> Result<(PointCloud, Vec<FpfhDescriptor>), RegistrationError> {
    ensure_positive("voxel size", voxel_size)?;
    let mut down = VoxelGrid::new(voxel_size).downsample(point_cloud);
    compute_normals(&mut down, &HybridSearchParams::new(voxel_size * 2.0, 30));
    let features = compute_fpfh_feature(&down, &HybridSearchParams::new(voxel_size * 5.0, 100))?;
    Ok((down, features))
}

/// Coarse registration by RANSAC over FPFH feature matches.
#[derive(Debug, Clone)]
pub struct CoarseAligner {
    /// Voxel size of the downsampling, also the unit of the search radii.
    pub voxel_size: f64,
    /// RANSAC parameters.
    pub params: RansacParams,
}

impl CoarseAligner {
    /// Create a coarse aligner with the default RANSAC parameters.
    pub fn new(voxel_size: f64) -> Self {
        Self {
            voxel_size,
            params: RansacParams::default(),
        }
    }

    /// Inlier distance used by the distance checker and the scoring.
    pub fn distance_threshold(&self) -> f64 {
        self.voxel_size * 1.5
    }
}

impl Registration for CoarseAligner {
    fn register(
        &self,
        source: &PointCloud,
        target: &PointCloud,
        init: &DMat4,
    ) -> Result<RegistrationResult, RegistrationError> {
        ensure_positive("voxel size", self.voxel_size)?;
        if source.is_empty() {
            return Err(RegistrationError::EmptyPointCloud("source"));
        }
        if target.is_empty() {
            return Err(RegistrationError::EmptyPointCloud("target"));
        }

        let (source_down, source_features) =
            preprocess_point_cloud(&source.transformed(init), self.voxel_size)?;
        let (target_down, target_features) = preprocess_point_cloud(target, self.voxel_size)?;

        log::info!(
            "Coarse alignment on {} source and {} target points (voxel size {})",
            source_down.len(),
            target_down.len(),
            self.voxel_size
        );

        let mut result = ransac_on_feature_matching(
            &source_down,
            &target_down,
            &source_features,
            &target_features,
            self.distance_threshold(),
            &self.params,
        )?;
        result.transformation *= *init;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{assert_mat4_eq, bumpy_sphere_cloud};
    use approx::assert_relative_eq;
    use glam::DQuat;

    #[test]
    fn test_edge_length_checker() {
        let source = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let scaled = vec![[0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [0.0, 5.0, 0.0]];
        let squashed = vec![[0.0, 0.0, 0.0], [20.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let sample = vec![(0, 0), (1, 1), (2, 2)];

        let checker = CorrespondenceChecker::EdgeLength(0.1);
        assert!(checker.check(&source, &scaled, &sample, &DMat4::IDENTITY));
        assert!(!checker.check(&source, &squashed, &sample, &DMat4::IDENTITY));
        assert!(!checker.requires_alignment());
    }

    #[test]
    fn test_distance_checker() {
        let source = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let target = vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.05]];
        let sample = vec![(0, 0), (1, 1)];
        let lift = DMat4::from_translation(DVec3::Z);

        assert!(CorrespondenceChecker::Distance(0.1).check(&source, &target, &sample, &lift));
        assert!(!CorrespondenceChecker::Distance(0.01).check(&source, &target, &sample, &lift));
    }

    #[test]
    fn test_match_features_mutual() {
        let mut a = [0.0; FPFH_DIM];
        let mut b = [0.0; FPFH_DIM];
        let mut c = [0.0; FPFH_DIM];
        a[0] = 100.0;
        b[11] = 100.0;
        c[22] = 100.0;
        let mut b_close = b;
        b_close[0] = 1.0;

        // source b and b_close both match target b, only b is mutual
        let source = vec![a, b, c, b_close];
        let target = vec![c, b, a];

        let mutual = match_features(&source, &target, true, 0);
        assert_eq!(mutual, vec![(0, 2), (1, 1), (2, 0)]);

        let all = match_features(&source, &target, false, 0);
        assert_eq!(all, vec![(0, 2), (1, 1), (2, 0), (3, 1)]);

        // too few mutual matches falls back to the one-way matches
        assert_eq!(match_features(&source, &target, true, 9), all);
    }

    #[test]
    fn test_ransac_not_enough_correspondences() {
        let points = vec![[0.0; 3]; 2];
        let result = ransac_on_correspondences(
            &points,
            &points,
            &[(0, 0), (1, 1)],
            0.1,
            &[],
            &RansacParams::default(),
        );
        assert!(matches!(
            result,
            Err(RegistrationError::NotEnoughCorrespondences {
                required: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_ransac_on_feature_matching_recovers_transform() -> Result<(), RegistrationError> {
        let voxel_size = 0.08;
        let (target_down, features) =
            preprocess_point_cloud(&bumpy_sphere_cloud(20_000, 1), voxel_size)?;

        let expected = DMat4::from_rotation_translation(
            DQuat::from_euler(glam::EulerRot::XYZ, 0.4, -0.9, 2.0),
            DVec3::new(0.3, -0.5, 1.2),
        );
        // exact copy of the target moved by the inverse transform, with the same descriptors
        let source_down = target_down.transformed(&expected.inverse());

        let params = RansacParams {
            random_seed: Some(3),
            ..Default::default()
        };
        let result = ransac_on_feature_matching(
            &source_down,
            &target_down,
            &features,
            &features,
            voxel_size * 1.5,
            &params,
        )?;

        assert_mat4_eq(&result.transformation, &expected, 1e-6);
        assert_relative_eq!(result.fitness, 1.0);
        Ok(())
    }

    #[test]
    fn test_coarse_aligner_identity() -> Result<(), RegistrationError> {
        let cloud = bumpy_sphere_cloud(20_000, 2);
        let mut aligner = CoarseAligner::new(0.08);
        aligner.params.random_seed = Some(11);

        let result = aligner.register(&cloud, &cloud, &DMat4::IDENTITY)?;
        assert_mat4_eq(&result.transformation, &DMat4::IDENTITY, 1e-6);
        assert_relative_eq!(result.fitness, 1.0);
        Ok(())
    }

    #[test]
    fn test_coarse_aligner_invalid_voxel() {
        let cloud = PointCloud::new(vec![[0.0; 3]], None);
        for voxel_size in [0.0, -0.01, f64::NAN] {
            let result = CoarseAligner::new(voxel_size).register(&cloud, &cloud, &DMat4::IDENTITY);
            assert!(matches!(result, Err(RegistrationError::InvalidParameter(_))));
        }
    }

    #[test]
    fn test_preprocess_invalid_voxel() {
        let cloud = bumpy_sphere_cloud(500, 3);
        for voxel_size in [0.0, -0.05, f64::NAN] {
            assert!(matches!(
                preprocess_point_cloud(&cloud, voxel_size),
                Err(RegistrationError::InvalidParameter(_))
            ));
        }
    }
}
