use glam::{DMat3, DMat4, DVec3};
use photoscan_3d::{linalg::svd3, neighbors::PointIndex};

use crate::RegistrationError;

// NaN fails the comparison and is rejected with the non-positive values
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<(), RegistrationError> {
    if value.is_nan() || value <= 0.0 {
        return Err(RegistrationError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

/// A correspondence between a source point index and a target point index.
pub type Correspondence = (usize, usize);

/// Quality of a transform between two point clouds.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Ratio of source points with a target neighbor within the distance threshold.
    pub fitness: f64,
    /// Root mean square distance over the inlier correspondences.
    pub inlier_rmse: f64,
    /// The inlier correspondences.
    pub correspondences: Vec<Correspondence>,
}

/// Estimate the similarity transform mapping the source points onto the target points.
///
/// Closed form least squares solution (Umeyama) for `target ~ s * R * source + t`. When
/// `with_scaling` is false the scale is fixed to one.
///
/// # Arguments
///
/// * `source` - The source points.
/// * `target` - The target points, paired by position with the source points.
/// * `with_scaling` - Whether to estimate a uniform scale.
///
/// # Returns
///
/// The homogeneous transform, or `None` with fewer than three pairs or when the source points
/// are all coincident.
pub fn estimate_similarity(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    with_scaling: bool,
) -> Option<DMat4> {
    assert_eq!(source.len(), target.len());
    let n = source.len();
    if n < 3 {
        return None;
    }

    let mean = |points: &[[f64; 3]]| {
        points
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + DVec3::from_array(*p))
            / n as f64
    };
    let src_mean = mean(source);
    let tgt_mean = mean(target);

    // cross covariance sigma = 1/n * sum[(t - t_mean) * (s - s_mean)^T]
    let mut sigma = DMat3::ZERO;
    let mut src_var = 0.0;
    for (s, t) in source.iter().zip(target.iter()) {
        let s = DVec3::from_array(*s) - src_mean;
        let t = DVec3::from_array(*t) - tgt_mean;
        sigma += DMat3::from_cols(t * s.x, t * s.y, t * s.z);
        src_var += s.length_squared();
    }
    sigma *= 1.0 / n as f64;
    src_var /= n as f64;

    if src_var < f64::EPSILON {
        return None;
    }

    let (u, d, v_t) = svd3(&sigma)?;

    let mut signs = DVec3::ONE;
    if u.determinant() * v_t.determinant() < 0.0 {
        signs.z = -1.0;
    }
    let rotation = u * DMat3::from_diagonal(signs) * v_t;

    let scale = if with_scaling {
        d.dot(signs) / src_var
    } else {
        1.0
    };
    let translation = tgt_mean - scale * (rotation * src_mean);

    Some(DMat4::from_mat3_translation(rotation * scale, translation))
}

/// Estimate the similarity transform from indexed correspondences.
pub fn estimate_similarity_from_correspondences(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    correspondences: &[Correspondence],
    with_scaling: bool,
) -> Option<DMat4> {
    let (src, tgt): (Vec<_>, Vec<_>) = correspondences
        .iter()
        .map(|&(i, j)| (source[i], target[j]))
        .unzip();
    estimate_similarity(&src, &tgt, with_scaling)
}

/// Score a transform by pairing every transformed source point with its closest target point.
///
/// # Arguments
///
/// * `source` - The source points.
/// * `target_index` - The KD-tree of the target points.
/// * `transform` - The transform applied to the source points.
/// * `max_distance` - Pairs farther apart than this are not inliers.
pub fn evaluate_registration(
    source: &[[f64; 3]],
    target_index: &PointIndex,
    transform: &DMat4,
    max_distance: f64,
) -> Evaluation {
    let max_distance_sq = max_distance * max_distance;

    let mut correspondences = Vec::new();
    let mut error_sq = 0.0;
    for (i, p) in source.iter().enumerate() {
        let query = transform.transform_point3(DVec3::from_array(*p)).to_array();
        if let Some(nn) = target_index.nearest(&query) {
            if nn.distance_sq <= max_distance_sq {
                correspondences.push((i, nn.index));
                error_sq += nn.distance_sq;
            }
        }
    }

    if correspondences.is_empty() || source.is_empty() {
        return Evaluation::default();
    }

    Evaluation {
        fitness: correspondences.len() as f64 / source.len() as f64,
        inlier_rmse: (error_sq / correspondences.len() as f64).sqrt(),
        correspondences,
    }
}
