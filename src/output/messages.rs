//! Output event types emitted by the tracking engine.
//!
//! Failure is carried explicitly (`DeltaPose::delta == None`). The all-NaN
//! sentinel only appears when a delta is flattened into a
//! [`DeltaPoseMessage`] for the wire.

use serde::Serialize;

use crate::geometry::SE3;

/// Pose of the sensor frame in the fixed frame, broadcast every processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformBroadcast {
    pub timestamp_ns: u64,
    /// Fixed (parent) frame.
    pub frame_id: String,
    /// Sensor (child) frame.
    pub child_frame_id: String,
    pub transform: SE3,
}

/// A timestamped pose, one entry of the path history.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseStamped {
    pub timestamp_ns: u64,
    pub pose: SE3,
}

/// Relative motion reported for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaPose {
    pub timestamp_ns: u64,
    /// `None` when the frame could not be registered.
    pub delta: Option<SE3>,
}

impl DeltaPose {
    pub fn succeeded(timestamp_ns: u64, delta: SE3) -> Self {
        Self {
            timestamp_ns,
            delta: Some(delta),
        }
    }

    pub fn failed(timestamp_ns: u64) -> Self {
        Self {
            timestamp_ns,
            delta: None,
        }
    }

    pub fn success(&self) -> bool {
        self.delta.is_some()
    }
}

/// Ordered history of keyframe poses in the fixed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathHistory {
    pub frame_id: String,
    pub poses: Vec<PoseStamped>,
}

impl PathHistory {
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            poses: Vec::new(),
        }
    }

    pub fn push(&mut self, pose: PoseStamped) {
        self.poses.push(pose);
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Any event handed to an output adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Transform(TransformBroadcast),
    Keyframe(PoseStamped),
    DeltaPose(DeltaPose),
}

/// Flat pose record: position and (x, y, z, w) orientation.
///
/// A failed delta is written with every pose field set to NaN.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeltaPoseMessage {
    pub timestamp_ns: u64,
    pub success: bool,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub qw: f64,
}

impl DeltaPoseMessage {
    pub fn from_delta(delta: &DeltaPose) -> Self {
        match delta.delta {
            Some(t) => Self::from_pose(delta.timestamp_ns, true, &t),
            None => Self {
                timestamp_ns: delta.timestamp_ns,
                success: false,
                px: f64::NAN,
                py: f64::NAN,
                pz: f64::NAN,
                qx: f64::NAN,
                qy: f64::NAN,
                qz: f64::NAN,
                qw: f64::NAN,
            },
        }
    }

    pub fn from_pose(timestamp_ns: u64, success: bool, pose: &SE3) -> Self {
        let q = pose.rotation.quaternion();
        Self {
            timestamp_ns,
            success,
            px: pose.translation.x,
            py: pose.translation.y,
            pz: pose.translation.z,
            qx: q.i,
            qy: q.j,
            qz: q.k,
            qw: q.w,
        }
    }

    /// Pose fields in (px, py, pz, qx, qy, qz, qw) order.
    pub fn pose_fields(&self) -> [f64; 7] {
        [
            self.px, self.py, self.pz, self.qx, self.qy, self.qz, self.qw,
        ]
    }
}

/// Row written for transform broadcasts and path entries.
#[derive(Debug, Clone, Serialize)]
pub struct StampedPoseRecord<'a> {
    pub timestamp_ns: u64,
    pub frame_id: &'a str,
    pub child_frame_id: &'a str,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub qw: f64,
}

impl<'a> StampedPoseRecord<'a> {
    pub fn new(timestamp_ns: u64, frame_id: &'a str, child_frame_id: &'a str, pose: &SE3) -> Self {
        let q = pose.rotation.quaternion();
        Self {
            timestamp_ns,
            frame_id,
            child_frame_id,
            px: pose.translation.x,
            py: pose.translation.y,
            pz: pose.translation.z,
            qx: q.i,
            qy: q.j,
            qz: q.k,
            qw: q.w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_failed_delta_flattens_to_nan_sentinel() {
        let msg = DeltaPoseMessage::from_delta(&DeltaPose::failed(17));

        assert_eq!(msg.timestamp_ns, 17);
        assert!(!msg.success);
        assert!(msg.pose_fields().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_successful_delta_keeps_pose() {
        let t = SE3::from_axis_angle(&Vector3::z(), 0.5, Vector3::new(1.0, 2.0, 3.0));
        let msg = DeltaPoseMessage::from_delta(&DeltaPose::succeeded(3, t));

        assert!(msg.success);
        assert_eq!([msg.px, msg.py, msg.pz], [1.0, 2.0, 3.0]);
        assert!((msg.qz - (0.25_f64).sin()).abs() < 1e-12);
        assert!((msg.qw - (0.25_f64).cos()).abs() < 1e-12);
    }
}
