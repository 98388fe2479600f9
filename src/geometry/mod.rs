//! Geometry utilities: SE3 transforms and closed-form rigid alignment.

pub mod alignment;
pub mod se3;

pub use alignment::{align_rigid, compute_centroid};
pub use se3::SE3;
