//! Bad-point filtering: raw `PointBatch` to dense `FeatureSet`.

use nalgebra::Vector3;
use tracing::error;

use super::point_batch::{FeatureSet, PointBatch};

/// Valid-point count below which a frame is reported as a partial image.
///
/// Roughly 10000 valid points for typical depth sensor resolutions.
pub const DEFAULT_PARTIAL_IMAGE_THRESHOLD: usize = 10_000;

/// Output of [`CloudFilter::filter`] for one frame.
#[derive(Debug, Clone)]
pub struct FilteredCloud {
    pub timestamp_ns: u64,
    /// Finite points only.
    pub features: FeatureSet,
    /// Number of points in the source batch, valid or not.
    pub total_count: usize,
}

impl FilteredCloud {
    pub fn valid_count(&self) -> usize {
        self.features.num_points()
    }

    /// True when no point survived filtering; such frames must not be registered.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Fraction of valid points in [0, 1]; 0 for an empty batch.
    pub fn valid_ratio(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.valid_count() as f64 / self.total_count as f64
    }
}

/// Drops points with any non-finite coordinate.
#[derive(Debug, Clone)]
pub struct CloudFilter {
    partial_image_threshold: usize,
}

impl CloudFilter {
    pub fn new(partial_image_threshold: usize) -> Self {
        Self {
            partial_image_threshold,
        }
    }

    pub fn partial_image_threshold(&self) -> usize {
        self.partial_image_threshold
    }

    /// Convert a raw batch into a dense feature set.
    ///
    /// A frame with fewer valid points than the partial-image threshold is
    /// reported but still returned in full; the check never rejects a frame.
    pub fn filter(&self, batch: &PointBatch) -> FilteredCloud {
        let valid: Vec<Vector3<f64>> = batch
            .points
            .iter()
            .filter(|p| is_valid_point(p))
            .map(|p| p.cast::<f64>())
            .collect();

        let filtered = FilteredCloud {
            timestamp_ns: batch.timestamp_ns,
            features: FeatureSet::from_points(&valid),
            total_count: batch.len(),
        };

        if !filtered.is_empty() && self.is_partial(&filtered) {
            error!(
                "Partial image! Missing {:.1}% of the image (received {})",
                100.0 - filtered.valid_ratio() * 100.0,
                filtered.valid_count()
            );
        }

        filtered
    }

    /// Advisory only.
    pub fn is_partial(&self, cloud: &FilteredCloud) -> bool {
        cloud.valid_count() < self.partial_image_threshold
    }
}

impl Default for CloudFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PARTIAL_IMAGE_THRESHOLD)
    }
}

#[inline]
fn is_valid_point(p: &Vector3<f32>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}
