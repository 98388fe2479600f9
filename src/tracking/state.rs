//! Tracking state: warm-up phase, absolute pose and running counters.

use crate::geometry::SE3;

/// Phase of the tracking state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    /// Dropping the first frames of the stream.
    WarmingUp,
    /// Registering every frame.
    Tracking,
}

/// Per-stream counters, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingStats {
    pub frames_received: usize,
    pub frames_dropped: usize,
    pub empty_frames: usize,
    pub registrations: usize,
    pub failures: usize,
    pub keyframes: usize,
    /// Recorded frames that could not be read and never reached tracking.
    pub unreadable_frames: usize,
}

/// Mutable state of one tracked stream.
///
/// Created once with the identity pose and mutated only by sequential
/// per-frame processing.
#[derive(Debug, Clone)]
pub struct TrackingState {
    /// Sensor pose in the fixed frame; only changed by successful registration.
    absolute: SE3,
    startup_drop_count: u32,
    dropped: u32,
    /// Whether the last registration call created a keyframe.
    keyframe_created: bool,
    stats: TrackingStats,
}

impl TrackingState {
    pub fn new(startup_drop_count: u32) -> Self {
        Self {
            absolute: SE3::identity(),
            startup_drop_count,
            dropped: 0,
            keyframe_created: false,
            stats: TrackingStats::default(),
        }
    }

    pub fn phase(&self) -> TrackingPhase {
        if self.dropped < self.startup_drop_count {
            TrackingPhase::WarmingUp
        } else {
            TrackingPhase::Tracking
        }
    }

    /// Count a received frame; true if it must be dropped as warm-up.
    pub(crate) fn admit_frame(&mut self) -> bool {
        self.stats.frames_received += 1;
        if self.phase() == TrackingPhase::WarmingUp {
            self.dropped += 1;
            self.stats.frames_dropped += 1;
            return true;
        }
        false
    }

    pub fn absolute(&self) -> &SE3 {
        &self.absolute
    }

    /// Accumulate a delta: new pose = previous pose ∘ delta.
    pub(crate) fn apply_delta(&mut self, delta: &SE3) {
        self.absolute = self.absolute.compose(delta);
    }

    pub fn keyframe_created(&self) -> bool {
        self.keyframe_created
    }

    pub(crate) fn set_keyframe_created(&mut self, created: bool) {
        self.keyframe_created = created;
        if created {
            self.stats.keyframes += 1;
        }
    }

    pub fn stats(&self) -> &TrackingStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut TrackingStats {
        &mut self.stats
    }
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::new(0)
    }
}
