//! SE3: 6-DOF rigid transformation (rotation + translation).
//!
//! Rotation is stored as a unit quaternion so it stays orthonormal under
//! repeated composition. Poses follow the `T_ab` convention: `T_ab` maps
//! points expressed in frame `b` into frame `a`.

use nalgebra::{Matrix3, Matrix4, Rotation3, Unit, UnitQuaternion, Vector3};

/// Rigid body transformation: p' = R * p + t.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Rotation of `angle` radians about `axis`, followed by `translation`.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64, translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::from_axis_angle(&Unit::new_normalize(*axis), angle),
            translation,
        }
    }

    /// Construct from quaternion components (w, x, y, z) and translation.
    ///
    /// The quaternion is normalized.
    pub fn from_quaternion(qw: f64, qx: f64, qy: f64, qz: f64, translation: Vector3<f64>) -> Self {
        let rotation =
            UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(qw, qx, qy, qz));
        Self {
            rotation,
            translation,
        }
    }

    /// Construct from a rotation matrix and translation.
    ///
    /// The matrix is assumed to be orthonormal.
    pub fn from_rotation_matrix(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rot3 = Rotation3::from_matrix_unchecked(rotation);
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot3),
            translation,
        }
    }

    /// Construct from a homogeneous 4x4 matrix [R | t; 0 | 1].
    pub fn from_matrix(mat: Matrix4<f64>) -> Self {
        let rotation = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]);
        Self::from_rotation_matrix(rotation, translation)
    }

    /// Homogeneous 4x4 matrix [R | t; 0 0 0 1].
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Composition `self * other`: apply `other` first, then `self`.
    ///
    /// With `T_wa.compose(&T_ab)` the result is `T_wb`.
    pub fn compose(&self, other: &SE3) -> SE3 {
        SE3 {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn inverse(&self) -> SE3 {
        let rotation = self.rotation.inverse();
        SE3 {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    #[inline]
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Rotation angle in radians (in [0, π]).
    pub fn rotation_angle(&self) -> f64 {
        self.rotation.angle()
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let t = SE3::from_axis_angle(&Vector3::new(0.3, -0.2, 1.0), 0.7, Vector3::new(1.0, 2.0, 3.0));
        let id = t.compose(&t.inverse());

        assert_relative_eq!(id.translation, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(id.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let yaw = SE3::from_axis_angle(&Vector3::z(), FRAC_PI_2, Vector3::zeros());
        let shift = SE3::from_translation(Vector3::new(1.0, 0.0, 0.0));

        // yaw * shift: translate along x, then rotate into y.
        let p = yaw.compose(&shift).transform_point(&Vector3::zeros());
        assert_relative_eq!(p, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);

        // shift * yaw: rotate (no-op at origin), then translate along x.
        let p = shift.compose(&yaw).transform_point(&Vector3::zeros());
        assert_relative_eq!(p, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_roundtrip_preserves_transform() {
        let t = SE3::from_quaternion(0.9, 0.1, -0.3, 0.2, Vector3::new(-1.0, 0.5, 4.0));
        let back = SE3::from_matrix(t.to_matrix());

        let p = Vector3::new(0.3, -2.0, 1.5);
        assert_relative_eq!(t.transform_point(&p), back.transform_point(&p), epsilon = 1e-10);
    }

    #[test]
    fn test_is_finite_detects_nan() {
        let mut t = SE3::identity();
        assert!(t.is_finite());
        t.translation.x = f64::NAN;
        assert!(!t.is_finite());
    }
}
