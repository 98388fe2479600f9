//! Raw sensor acquisitions and the dense feature matrix built from them.

use nalgebra::{Matrix4xX, Vector3, Vector4};

/// One sensor acquisition: an ordered set of 3D points as delivered by the
/// driver. Dropouts are reported as non-finite coordinates.
#[derive(Debug, Clone)]
pub struct PointBatch {
    /// Acquisition time in nanoseconds.
    pub timestamp_ns: u64,
    pub points: Vec<Vector3<f32>>,
}

impl PointBatch {
    pub fn new(timestamp_ns: u64, points: Vec<Vector3<f32>>) -> Self {
        Self {
            timestamp_ns,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Dense homogeneous point matrix: rows are (x, y, z, 1), one column per
/// valid point. May hold zero columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    features: Matrix4xX<f64>,
}

impl FeatureSet {
    pub fn empty() -> Self {
        Self {
            features: Matrix4xX::zeros(0),
        }
    }

    /// Build from Euclidean points, appending the homogeneous 1.
    pub fn from_points(points: &[Vector3<f64>]) -> Self {
        let mut features = Matrix4xX::zeros(points.len());
        for (i, p) in points.iter().enumerate() {
            features.set_column(i, &Vector4::new(p.x, p.y, p.z, 1.0));
        }
        Self { features }
    }

    pub fn num_points(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.features.ncols() == 0
    }

    /// Euclidean part of column `idx`.
    pub fn point(&self, idx: usize) -> Vector3<f64> {
        self.features.fixed_view::<3, 1>(0, idx).into_owned()
    }

    pub fn points(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        (0..self.num_points()).map(move |i| self.point(i))
    }

    pub fn to_points(&self) -> Vec<Vector3<f64>> {
        self.points().collect()
    }

    /// The underlying 4xN matrix.
    pub fn matrix(&self) -> &Matrix4xX<f64> {
        &self.features
    }
}
