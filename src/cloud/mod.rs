//! Point cloud input types and preprocessing.

pub mod filter;
pub mod point_batch;

pub use filter::{CloudFilter, FilteredCloud, DEFAULT_PARTIAL_IMAGE_THRESHOLD};
pub use point_batch::{FeatureSet, PointBatch};
