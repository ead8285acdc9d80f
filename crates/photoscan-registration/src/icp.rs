use glam::DMat4;
use photoscan_3d::{neighbors::PointIndex, pointcloud::PointCloud};

use crate::ops::{
    ensure_positive, estimate_similarity_from_correspondences, evaluate_registration,
};
use crate::{Registration, RegistrationError, RegistrationResult};

/// Default maximum correspondence distance of the fine alignment.
pub const DEFAULT_ICP_THRESHOLD: f64 = 0.02;

/// Structure to define the ICP stopping rules.
#[derive(Debug, Clone)]
pub struct IcpConvergenceCriteria {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Stop when the fitness changes less than this between two iterations.
    pub relative_fitness: f64,
    /// Stop when the inlier RMSE changes less than this between two iterations.
    pub relative_rmse: f64,
}

impl Default for IcpConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            relative_fitness: 1e-6,
            relative_rmse: 1e-6,
        }
    }
}

/// Iterative Closest Point refinement with point to point distance.
///
/// Every iteration pairs each source point with its closest target point within
/// `max_correspondence_distance`, estimates the similarity (or rigid) transform of the pairs
/// and left-multiplies it onto the running estimate.
#[derive(Debug, Clone)]
pub struct FineAligner {
    /// Pairs farther apart than this are ignored.
    pub max_correspondence_distance: f64,
    /// Whether a uniform scale is estimated along with the rigid motion.
    pub with_scaling: bool,
    /// Stopping rules.
    pub criteria: IcpConvergenceCriteria,
}

impl Default for FineAligner {
    fn default() -> Self {
        Self {
            max_correspondence_distance: DEFAULT_ICP_THRESHOLD,
            with_scaling: true,
            criteria: IcpConvergenceCriteria::default(),
        }
    }
}

impl FineAligner {
    /// Create a fine aligner estimating scale, with the default stopping rules.
    pub fn new(max_correspondence_distance: f64) -> Self {
        Self {
            max_correspondence_distance,
            ..Default::default()
        }
    }
}

impl Registration for FineAligner {
    fn register(
        &self,
        source: &PointCloud,
        target: &PointCloud,
        init: &DMat4,
    ) -> Result<RegistrationResult, RegistrationError> {
        ensure_positive("max correspondence distance", self.max_correspondence_distance)?;
        if source.is_empty() {
            return Err(RegistrationError::EmptyPointCloud("source"));
        }
        if target.is_empty() {
            return Err(RegistrationError::EmptyPointCloud("target"));
        }

        // build kdtree for target points to speed up the nearest neighbor search
        let index = PointIndex::new(target.points());

        let mut transformation = *init;
        let mut current = source.transformed(init).points().to_vec();
        let mut evaluation = evaluate_registration(
            &current,
            &index,
            &DMat4::IDENTITY,
            self.max_correspondence_distance,
        );

        let mut num_iterations = 0;
        for i in 0..self.criteria.max_iterations {
            log::debug!(
                "ICP iteration {}: fitness {:.6}, rmse {:.6}",
                i,
                evaluation.fitness,
                evaluation.inlier_rmse
            );

            let update = estimate_similarity_from_correspondences(
                &current,
                target.points(),
                &evaluation.correspondences,
                self.with_scaling,
            )
            .unwrap_or(DMat4::IDENTITY);

            transformation = update * transformation;
            for p in current.iter_mut() {
                *p = update.transform_point3(glam::DVec3::from_array(*p)).to_array();
            }

            let previous = evaluation;
            evaluation = evaluate_registration(
                &current,
                &index,
                &DMat4::IDENTITY,
                self.max_correspondence_distance,
            );
            num_iterations = i + 1;

            if (previous.fitness - evaluation.fitness).abs() < self.criteria.relative_fitness
                && (previous.inlier_rmse - evaluation.inlier_rmse).abs()
                    < self.criteria.relative_rmse
            {
                break;
            }
        }

        log::info!(
            "ICP finished after {} iterations: fitness {:.6}, rmse {:.6}",
            num_iterations,
            evaluation.fitness,
            evaluation.inlier_rmse
        );

        Ok(RegistrationResult {
            transformation,
            fitness: evaluation.fitness,
            inlier_rmse: evaluation.inlier_rmse,
            num_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::assert_mat4_eq;
    use approx::assert_relative_eq;
    use glam::DVec3;

    // three orthogonal planes meeting at the origin, without shared points
    fn corner_grid(spacing: f64) -> PointCloud {
        let mut points = Vec::new();
        for i in 1..=10 {
            for j in 1..=10 {
                let (a, b) = (i as f64 * spacing, j as f64 * spacing);
                points.push([0.0, a, b]);
                points.push([a, 0.0, b]);
                points.push([a, b, 0.0]);
            }
        }
        PointCloud::new(points, None)
    }

    #[test]
    fn test_icp_recovers_translation() -> Result<(), RegistrationError> {
        let target = corner_grid(0.05);
        let expected = DMat4::from_translation(DVec3::new(0.01, 0.008, -0.006));
        let source = target.transformed(&expected.inverse());

        let result = FineAligner::new(0.1).register(&source, &target, &DMat4::IDENTITY)?;

        assert_mat4_eq(&result.transformation, &expected, 1e-9);
        assert_relative_eq!(result.fitness, 1.0);
        assert!(result.inlier_rmse < 1e-9);
        assert!(result.num_iterations <= 3);
        Ok(())
    }

    #[test]
    fn test_icp_recovers_scale() -> Result<(), RegistrationError> {
        let target = corner_grid(0.05);
        let center = target.centroid();
        let expected = DMat4::from_translation(center)
            * DMat4::from_scale(DVec3::splat(1.01))
            * DMat4::from_translation(-center);
        let source = target.transformed(&expected.inverse());

        let result = FineAligner::new(0.1).register(&source, &target, &DMat4::IDENTITY)?;
        assert_mat4_eq(&result.transformation, &expected, 1e-9);
        Ok(())
    }

    #[test]
    fn test_icp_keeps_good_initial_guess() -> Result<(), RegistrationError> {
        let target = corner_grid(0.05);
        let expected = DMat4::from_rotation_translation(
            glam::DQuat::from_rotation_z(0.5),
            DVec3::new(1.0, -2.0, 0.5),
        );
        let source = target.transformed(&expected.inverse());

        let result = FineAligner::new(0.1).register(&source, &target, &expected)?;
        assert_mat4_eq(&result.transformation, &expected, 1e-9);
        assert_eq!(result.num_iterations, 1);
        Ok(())
    }

    #[test]
    fn test_icp_no_overlap() -> Result<(), RegistrationError> {
        let target = corner_grid(0.05);
        let source = target.transformed(&DMat4::from_translation(DVec3::splat(10.0)));

        let result = FineAligner::new(0.1).register(&source, &target, &DMat4::IDENTITY)?;
        assert_eq!(result.fitness, 0.0);
        assert_mat4_eq(&result.transformation, &DMat4::IDENTITY, 1e-12);
        Ok(())
    }

    #[test]
    fn test_icp_invalid_inputs() {
        let target = corner_grid(0.05);
        let empty = PointCloud::default();
        let aligner = FineAligner::new(0.1);
        assert!(matches!(
            aligner.register(&empty, &target, &DMat4::IDENTITY),
            Err(RegistrationError::EmptyPointCloud("source"))
        ));
        for distance in [0.0, -0.1, f64::NAN] {
            assert!(matches!(
                FineAligner::new(distance).register(&target, &target, &DMat4::IDENTITY),
                Err(RegistrationError::InvalidParameter(_))
            ));
        }
    }
}
