//! Tracking: turns filtered clouds into absolute and delta poses.
//!
//! - Warm-up dropping of the first frames
//! - Registration against the current keyframe
//! - Failure containment and keyframe reset
//! - Absolute pose accumulation and event emission

pub mod engine;
pub mod result;
pub mod state;

pub use engine::TrackingEngine;
pub use result::{FrameReport, FrameStatus};
pub use state::{TrackingPhase, TrackingState, TrackingStats};
