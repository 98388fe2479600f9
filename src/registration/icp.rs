//! Point-to-point Iterative Closest Point.
//!
//! ```text
//! Input: reference R (keyframe, k-d tree), reading S, initial guess T₀
//! Output: T* with R ≈ T* · S
//!
//! for each iteration:
//!   1. S' = T · S
//!   2. nearest neighbour in R for each point of S', drop pairs beyond
//!      the correspondence distance, keep the closest share of the rest
//!   3. ΔT = closed-form rigid alignment of the pairs
//!   4. T = ΔT · T
//!   5. converged once ΔT is below both epsilons
//! ```

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

use super::RegistrationError;
use crate::cloud::FeatureSet;
use crate::geometry::{align_rigid, SE3};

/// Configuration for point-to-point ICP and the keyframe policy around it.
#[derive(Debug, Clone, PartialEq)]
pub struct IcpConfig {
    /// Maximum number of iterations before giving up.
    pub max_iterations: u32,

    /// Pairs farther apart than this (meters) are rejected.
    pub max_correspondence_distance: f64,

    /// Share (0, 1] of the closest surviving pairs kept each iteration.
    pub outlier_keep_ratio: f64,

    /// Fewer pairs than this fails the match.
    pub min_correspondences: usize,

    /// Translation increment (meters) below which ICP has converged.
    pub translation_epsilon: f64,

    /// Rotation increment (radians) below which ICP has converged.
    pub rotation_epsilon: f64,

    /// Largest admissible move away from the initial guess (meters).
    pub max_translation_per_frame: f64,

    /// Readings larger than this are decimated with a uniform stride.
    pub max_points: usize,

    /// Below this match ratio the current frame becomes the new keyframe.
    pub ratio_to_switch_keyframe: f64,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            max_correspondence_distance: 0.5,
            outlier_keep_ratio: 0.85,
            min_correspondences: 20,
            translation_epsilon: 0.001, // 1mm
            rotation_epsilon: 0.001,    // ~0.06°
            max_translation_per_frame: 1.0,
            max_points: 5000,
            ratio_to_switch_keyframe: 0.8,
        }
    }
}

/// Rotation applied to points before they enter the k-d tree.
///
/// kiddo cannot split a bucket whose points all share one coordinate on the
/// split axis. Depth sensors produce exactly that for walls and floors facing
/// the sensor axes, so the tree is built in a basis aligned with no
/// plausible scene plane. Distances are invariant under the rotation.
fn index_basis() -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(Vector3::new(0.3971, 0.8314, 0.2653))
}

/// Keyframe points with their nearest-neighbour index.
pub struct ReferenceCloud {
    points: Vec<Vector3<f64>>,
    basis: UnitQuaternion<f64>,
    tree: KdTree<f64, 3>,
}

impl ReferenceCloud {
    /// Index `points`. Exact duplicates are collapsed into one point.
    pub fn from_points(mut points: Vec<Vector3<f64>>) -> Self {
        points.sort_by(|a, b| {
            a.x.total_cmp(&b.x)
                .then(a.y.total_cmp(&b.y))
                .then(a.z.total_cmp(&b.z))
        });
        points.dedup();

        let basis = index_basis();
        let mut tree: KdTree<f64, 3> = KdTree::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            let q = basis * p;
            tree.add(&[q.x, q.y, q.z], i as u64);
        }
        Self {
            points,
            basis,
            tree,
        }
    }

    pub fn from_features(features: &FeatureSet) -> Self {
        Self::from_points(features.to_points())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest reference point: (index, squared distance).
    fn nearest(&self, p: &Vector3<f64>) -> (usize, f64) {
        let q = self.basis * p;
        let idx = self.tree.nearest_one::<SquaredEuclidean>(&[q.x, q.y, q.z]).item as usize;
        (idx, (self.points[idx] - p).norm_squared())
    }
}

/// Result of a converged alignment.
#[derive(Debug, Clone, Copy)]
pub struct IcpResult {
    /// Maps reading points into the reference frame.
    pub transform: SE3,
    pub iterations: u32,
    /// Inlier pairs / reading points of the final iteration.
    pub match_ratio: f64,
    pub rms_error: f64,
    pub correspondence_count: usize,
}

/// Point-to-point ICP solver.
#[derive(Debug, Clone)]
pub struct PointToPointIcp {
    config: IcpConfig,
}

impl PointToPointIcp {
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Align `reading` onto `reference`, starting from `initial`.
    pub fn align(
        &self,
        reference: &ReferenceCloud,
        reading: &[Vector3<f64>],
        initial: &SE3,
    ) -> Result<IcpResult, RegistrationError> {
        let required = self.config.min_correspondences.max(3);
        if reference.is_empty() || reading.len() < required {
            return Err(RegistrationError::NotEnoughPoints {
                found: reading.len().min(reference.len()),
                required,
            });
        }

        let mut transform = *initial;

        for iter in 0..self.config.max_iterations {
            let transformed: Vec<Vector3<f64>> =
                reading.iter().map(|p| transform.transform_point(p)).collect();

            let correspondences = self.find_correspondences(reference, &transformed);
            if correspondences.len() < required {
                return Err(RegistrationError::NotEnoughPoints {
                    found: correspondences.len(),
                    required,
                });
            }

            let (matched_reading, matched_reference): (Vec<_>, Vec<_>) = correspondences
                .iter()
                .map(|&(src, tgt, _)| (transformed[src], reference.points[tgt]))
                .unzip();

            let increment = align_rigid(&matched_reading, &matched_reference)
                .ok_or(RegistrationError::Degenerate { iteration: iter })?;
            transform = increment.compose(&transform);

            let moved = (transform.translation - initial.translation).norm();
            if moved > self.config.max_translation_per_frame {
                return Err(RegistrationError::Diverged {
                    translation: moved,
                    bound: self.config.max_translation_per_frame,
                });
            }

            let sum_sq: f64 = correspondences.iter().map(|c| c.2).sum();
            let rms_error = (sum_sq / correspondences.len() as f64).sqrt();
            let match_ratio = correspondences.len() as f64 / reading.len() as f64;

            debug!(
                iteration = iter,
                pairs = correspondences.len(),
                rms_error,
                "ICP iteration"
            );

            if increment.translation.norm() < self.config.translation_epsilon
                && increment.rotation_angle() < self.config.rotation_epsilon
            {
                return Ok(IcpResult {
                    transform,
                    iterations: iter + 1,
                    match_ratio,
                    rms_error,
                    correspondence_count: correspondences.len(),
                });
            }
        }

        Err(RegistrationError::ConvergenceFailure {
            iterations: self.config.max_iterations,
        })
    }

    /// Nearest-neighbour pairs (reading_idx, reference_idx, squared distance),
    /// distance-gated and trimmed to the closest share.
    fn find_correspondences(
        &self,
        reference: &ReferenceCloud,
        transformed: &[Vector3<f64>],
    ) -> Vec<(usize, usize, f64)> {
        let max_dist_sq = self.config.max_correspondence_distance.powi(2);

        let mut correspondences: Vec<(usize, usize, f64)> = transformed
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                let (j, dist_sq) = reference.nearest(p);
                (dist_sq <= max_dist_sq).then_some((i, j, dist_sq))
            })
            .collect();

        let keep_ratio = self.config.outlier_keep_ratio.clamp(0.0, 1.0);
        if keep_ratio < 1.0 && !correspondences.is_empty() {
            correspondences.sort_by(|a, b| a.2.total_cmp(&b.2));
            let keep = ((correspondences.len() as f64) * keep_ratio).ceil() as usize;
            correspondences.truncate(keep.max(1));
        }

        correspondences
    }
}

/// Uniform-stride decimation down to at most `max_points`.
pub fn decimate(points: Vec<Vector3<f64>>, max_points: usize) -> Vec<Vector3<f64>> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }
    let stride = points.len().div_ceil(max_points);
    points.into_iter().step_by(stride).collect()
}
