use glam::{DMat3, DMat4, DVec3};
use nalgebra::Matrix3;

/// Transform a set of points using a homogeneous transformation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_t_src` - A 4x4 homogeneous transform (rotation, scale and translation).
/// * `dst_points` - A pre-allocated vector to store the transformed points.
///
/// PRECONDITION: dst_points is a pre-allocated vector of the same size as source.
///
/// Example:
///
/// ```
/// use glam::DMat4;
/// use photoscan_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &DMat4::IDENTITY, &mut dst_points);
/// assert_eq!(src_points, dst_points);
/// ```
pub fn transform_points(src_points: &[[f64; 3]], dst_t_src: &DMat4, dst_points: &mut [[f64; 3]]) {
    assert_eq!(src_points.len(), dst_points.len());

    for (src, dst) in src_points.iter().zip(dst_points.iter_mut()) {
        *dst = dst_t_src
            .transform_point3(DVec3::from_array(*src))
            .to_array();
    }
}

/// Convert a glam matrix into a nalgebra matrix.
pub fn dmat3_to_matrix3(m: &DMat3) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| m.col(j)[i])
}

/// Convert a nalgebra matrix into a glam matrix.
pub fn matrix3_to_dmat3(m: &Matrix3<f64>) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]),
        DVec3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]),
        DVec3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]),
    )
}

/// Singular value decomposition of a 3x3 matrix.
///
/// Returns `(u, s, v_t)` such that `m = u * diag(s) * v_t`, with the singular values sorted
/// in decreasing order. Returns `None` if the decomposition did not produce the singular
/// vectors.
pub fn svd3(m: &DMat3) -> Option<(DMat3, DVec3, DMat3)> {
    let svd = dmat3_to_matrix3(m).svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let s = svd.singular_values;
    Some((
        matrix3_to_dmat3(&u),
        DVec3::new(s[0], s[1], s[2]),
        matrix3_to_dmat3(&v_t),
    ))
}

/// Compute the rotation closest to a 3x3 matrix in the Frobenius sense.
///
/// The polar factor `U * V^T` of the decomposition removes any scale and shear. A reflection
/// is corrected by flipping the singular vector associated with the smallest singular value.
pub fn closest_rotation(m: &DMat3) -> Option<DMat3> {
    let (u, _, v_t) = svd3(m)?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let u_corrected = DMat3::from_cols(u.x_axis, u.y_axis, -u.z_axis);
        r = u_corrected * v_t;
    }
    Some(r)
}

/// Eigenvector of a symmetric 3x3 matrix associated with its smallest eigenvalue.
pub fn smallest_eigenvector(m: &DMat3) -> DVec3 {
    let eigen = dmat3_to_matrix3(m).symmetric_eigen();

    let (min_index, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best_i, best_v), (i, &v)| {
            if v < best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        });

    let v = eigen.eigenvectors.column(min_index);
    DVec3::new(v[0], v[1], v[2])
}
