//! Per-frame tracking report.
//!
//! Describes what happened to a single frame; output events are delivered
//! separately through the output adapter.

use crate::geometry::SE3;
use crate::registration::RegistrationError;

/// How a frame was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    /// Dropped during warm-up, nothing emitted.
    WarmUp,
    /// No valid point; registration skipped.
    Empty,
    /// Registration converged.
    Tracked { match_ratio: f64 },
    /// Registration failed; the keyframe was reset to this frame.
    Lost(RegistrationError),
}

/// Summary of tracking for a single frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub timestamp_ns: u64,
    pub status: FrameStatus,
    /// Absolute pose after this frame.
    pub pose: SE3,
    pub total_points: usize,
    pub valid_points: usize,
    pub keyframe_created: bool,
    pub elapsed_ms: f64,
}

impl FrameReport {
    pub fn is_tracked(&self) -> bool {
        matches!(self.status, FrameStatus::Tracked { .. })
    }
}
