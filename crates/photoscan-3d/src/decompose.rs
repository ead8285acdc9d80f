use std::fmt;

use glam::{DMat3, DMat4, DQuat, DVec3};

use crate::linalg::closest_rotation;
use crate::transforms::{euler_xyz_to_rotation_matrix, rotation_matrix_to_euler_xyz};

/// Maximum allowed difference between the per-axis scales of a similarity transform.
pub const SCALE_TOLERANCE: f64 = 1e-6;

/// Error types for the transform decomposition.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecomposeError {
    /// The basis columns have different norms, the transform is not a similarity.
    #[error("Transform is not a similarity: per-axis scales {0:?} differ by more than 1e-6")]
    NonUniformScale([f64; 3]),

    /// The linear part of the transform has no valid orthonormal factor.
    #[error("Cannot orthonormalize the linear part of the transform")]
    Degenerate,
}

/// A 3D coordinate triple used for human readable reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
}

impl From<[f64; 3]> for Coordinates {
    fn from(v: [f64; 3]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x: {}, y: {}, z: {}", self.x, self.y, self.z)
    }
}

/// A similarity transform split into rotation, translation and uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedTransform {
    /// Extrinsic `xyz` Euler angles in degrees.
    pub rotation: Coordinates,
    /// Translation vector.
    pub translation: Coordinates,
    /// Uniform scale factor.
    pub scale: f64,
}

impl DecomposedTransform {
    /// Rebuild the homogeneous matrix `T = [s * R | t]`.
    pub fn to_matrix(&self) -> DMat4 {
        let rotation = euler_xyz_to_rotation_matrix([
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        ]);
        DMat4::from_scale_rotation_translation(
            DVec3::splat(self.scale),
            DQuat::from_mat3(&rotation),
            DVec3::new(self.translation.x, self.translation.y, self.translation.z),
        )
    }
}

impl fmt::Display for DecomposedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rotation: {}", self.rotation)?;
        writeln!(f, "Translation: {}", self.translation)?;
        write!(f, "Scale: {}", self.scale)
    }
}

/// Decompose a 4x4 similarity transform into rotation, translation and scale.
///
/// The scale is measured independently on each basis column. The three values must agree
/// within [`SCALE_TOLERANCE`]; a transform with shear or anisotropic scale is rejected.
///
/// # Arguments
///
/// * `transform` - The homogeneous transform to decompose.
///
/// # Returns
///
/// The rotation as extrinsic `xyz` Euler angles in degrees, the translation and the scale.
///
/// Example:
///
/// ```
/// use glam::{DMat4, DQuat, DVec3};
/// use photoscan_3d::decompose::decompose_transform;
///
/// let transform = DMat4::from_scale_rotation_translation(
///     DVec3::splat(2.0),
///     DQuat::IDENTITY,
///     DVec3::new(1.0, 2.0, 3.0),
/// );
/// let decomposed = decompose_transform(&transform).unwrap();
/// assert_eq!(decomposed.scale, 2.0);
/// assert_eq!(decomposed.translation.z, 3.0);
/// ```
pub fn decompose_transform(transform: &DMat4) -> Result<DecomposedTransform, DecomposeError> {
    let linear = DMat3::from_mat4(*transform);

    let scales = [
        linear.x_axis.length(),
        linear.y_axis.length(),
        linear.z_axis.length(),
    ];
    // written positively so that non-finite scales are rejected
    let uniform = (scales[0] - scales[1]).abs() < SCALE_TOLERANCE
        && (scales[1] - scales[2]).abs() < SCALE_TOLERANCE;
    if !uniform {
        return Err(DecomposeError::NonUniformScale(scales));
    }

    let rotation = closest_rotation(&linear).ok_or(DecomposeError::Degenerate)?;
    let angles = rotation_matrix_to_euler_xyz(&rotation).map(f64::to_degrees);

    Ok(DecomposedTransform {
        rotation: angles.into(),
        translation: transform.w_axis.truncate().to_array().into(),
        scale: scales[0],
    })
}
