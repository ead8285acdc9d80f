use glam::DMat3;

/// Build a rotation matrix from extrinsic `xyz` Euler angles in radians.
///
/// The rotations are applied about the fixed x, y and z axes in that order, which gives
/// `R = Rz(z) * Ry(y) * Rx(x)`.
pub fn euler_xyz_to_rotation_matrix(angles: [f64; 3]) -> DMat3 {
    DMat3::from_rotation_z(angles[2])
        * DMat3::from_rotation_y(angles[1])
        * DMat3::from_rotation_x(angles[0])
}

/// Extract extrinsic `xyz` Euler angles in radians from a rotation matrix.
///
/// Inverse of [`euler_xyz_to_rotation_matrix`]. At gimbal lock (`|y| = pi/2`) the x angle is
/// fixed to zero and the whole in-plane rotation is reported on z.
///
/// PRECONDITION: `rotation` is orthonormal with determinant +1.
pub fn rotation_matrix_to_euler_xyz(rotation: &DMat3) -> [f64; 3] {
    // element (row, col)
    let r = |row: usize, col: usize| rotation.col(col)[row];

    let sy = (-r(2, 0)).clamp(-1.0, 1.0);
    let y = sy.asin();

    if sy.abs() < 1.0 - 1e-12 {
        let x = r(2, 1).atan2(r(2, 2));
        let z = r(1, 0).atan2(r(0, 0));
        [x, y, z]
    } else {
        let z = (-r(0, 1)).atan2(r(1, 1));
        [0.0, y, z]
    }
}
