//! Closed-form rigid alignment of paired 3D points.
//!
//! Finds the rotation and translation minimizing the squared distance between
//! `T * source[i]` and `target[i]`, following Horn's absolute-orientation
//! method with the scale fixed to 1.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use super::SE3;

/// Compute the rigid transform T such that `target ≈ T * source`.
///
/// Returns `None` with fewer than 3 pairs, mismatched lengths, or when the
/// SVD of the cross-covariance fails to produce its factors.
pub fn align_rigid(source: &[Vector3<f64>], target: &[Vector3<f64>]) -> Option<SE3> {
    let n = source.len();
    if n < 3 || n != target.len() {
        return None;
    }

    let centroid_src = compute_centroid(source);
    let centroid_tgt = compute_centroid(target);

    // Cross-covariance H = sum((p_src - c_src) * (p_tgt - c_tgt)^T)
    let mut h = Matrix3::zeros();
    for (p_src, p_tgt) in source.iter().zip(target.iter()) {
        h += (p_src - centroid_src) * (p_tgt - centroid_tgt).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;

    // R = V * U^T
    let mut rotation_mat = v_t.transpose() * u.transpose();

    // det(R) = -1 is a reflection: flip the last column of V
    if rotation_mat.determinant() < 0.0 {
        let mut v = v_t.transpose();
        for i in 0..3 {
            v[(i, 2)] = -v[(i, 2)];
        }
        rotation_mat = v * u.transpose();
    }

    let rotation =
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_mat));
    let translation = centroid_tgt - rotation * centroid_src;

    Some(SE3 {
        rotation,
        translation,
    })
}

/// Compute centroid of a set of 3D points.
pub fn compute_centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    if points.is_empty() {
        return Vector3::zeros();
    }
    let sum: Vector3<f64> = points.iter().sum();
    sum / points.len() as f64
}
