//! Keyframe-based ICP over a frame sequence.
//!
//! Every frame is aligned against the current keyframe, starting from the
//! keyframe-relative pose of the previous frame. The first frame, or a frame
//! whose match ratio drops below `ratio_to_switch_keyframe`, becomes the new
//! keyframe.

use tracing::debug;

use super::icp::{decimate, IcpConfig, PointToPointIcp, ReferenceCloud};
use super::{Converged, Registration, RegistrationOutcome};
use crate::cloud::FeatureSet;
use crate::geometry::SE3;

pub struct IcpSequence {
    icp: PointToPointIcp,
    keyframe: Option<ReferenceCloud>,

    /// Pose of the last registered frame in the keyframe (T_kf_cur).
    relative_pose: SE3,

    keyframe_created: bool,
    last_match_ratio: Option<f64>,
}

impl IcpSequence {
    pub fn new(config: IcpConfig) -> Self {
        Self {
            icp: PointToPointIcp::new(config),
            keyframe: None,
            relative_pose: SE3::identity(),
            keyframe_created: false,
            last_match_ratio: None,
        }
    }

    pub fn config(&self) -> &IcpConfig {
        self.icp.config()
    }

    pub fn has_keyframe(&self) -> bool {
        self.keyframe.is_some()
    }

    /// Number of points in the current keyframe (0 without one).
    pub fn keyframe_len(&self) -> usize {
        self.keyframe.as_ref().map_or(0, ReferenceCloud::len)
    }

    pub fn relative_pose(&self) -> &SE3 {
        &self.relative_pose
    }

    /// Match ratio of the last successful call.
    pub fn last_match_ratio(&self) -> Option<f64> {
        self.last_match_ratio
    }

    fn set_keyframe(&mut self, features: &FeatureSet) {
        self.keyframe = Some(ReferenceCloud::from_features(features));
        self.relative_pose = SE3::identity();
    }
}

impl Registration for IcpSequence {
    fn match_cloud(&mut self, features: &FeatureSet) -> RegistrationOutcome {
        self.keyframe_created = false;

        let Some(keyframe) = self.keyframe.as_ref() else {
            self.set_keyframe(features);
            self.keyframe_created = true;
            self.last_match_ratio = Some(1.0);
            return Ok(Converged {
                delta: SE3::identity(),
                match_ratio: 1.0,
            });
        };

        let reading = decimate(features.to_points(), self.icp.config().max_points);
        let result = self.icp.align(keyframe, &reading, &self.relative_pose)?;

        // T_prev_cur = T_kf_prev⁻¹ · T_kf_cur
        let delta = self.relative_pose.inverse().compose(&result.transform);
        self.relative_pose = result.transform;
        self.last_match_ratio = Some(result.match_ratio);

        if result.match_ratio < self.icp.config().ratio_to_switch_keyframe {
            debug!(
                match_ratio = result.match_ratio,
                threshold = self.icp.config().ratio_to_switch_keyframe,
                "switching keyframe"
            );
            self.set_keyframe(features);
            self.keyframe_created = true;
        }

        Ok(Converged {
            delta,
            match_ratio: result.match_ratio,
        })
    }

    fn reset_tracking(&mut self, features: &FeatureSet) {
        self.set_keyframe(features);
    }

    fn keyframe_created_at_last_call(&self) -> bool {
        self.keyframe_created
    }
}
