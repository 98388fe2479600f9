//! Tracking engine: per-frame state machine around cloud registration.
//!
//! For each frame:
//! 1. Drop it silently while warming up
//! 2. Filter non-finite points; an empty frame only yields a failed delta
//! 3. Register against the keyframe
//! 4. On success accumulate the pose, report a new keyframe if one was made
//! 5. On failure keep the pose; with delta output on, reseed the keyframe with
//!    this frame
//! 6. Broadcast the absolute pose

use std::time::Instant;

use tracing::{error, info, warn};

use crate::cloud::{CloudFilter, FilteredCloud, PointBatch};
use crate::config::TrackerConfig;
use crate::geometry::SE3;
use crate::output::{DeltaPose, OutputAdapter, PoseStamped, TransformBroadcast};
use crate::registration::Registration;
use crate::tracking::result::{FrameReport, FrameStatus};
use crate::tracking::state::{TrackingPhase, TrackingState};

pub struct TrackingEngine<R: Registration> {
    registration: R,
    filter: CloudFilter,
    state: TrackingState,

    fixed_frame: String,
    sensor_frame: String,
    send_delta_pose: bool,
}

impl<R: Registration> TrackingEngine<R> {
    pub fn new(registration: R, config: &TrackerConfig) -> Self {
        Self {
            registration,
            filter: CloudFilter::new(config.partial_image_threshold),
            state: TrackingState::new(config.startup_drop_count),
            fixed_frame: config.fixed_frame.clone(),
            sensor_frame: config.sensor_frame.clone(),
            send_delta_pose: config.send_delta_pose,
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn phase(&self) -> TrackingPhase {
        self.state.phase()
    }

    /// Current sensor pose in the fixed frame.
    pub fn pose(&self) -> &SE3 {
        self.state.absolute()
    }

    pub fn registration(&self) -> &R {
        &self.registration
    }

    pub fn fixed_frame(&self) -> &str {
        &self.fixed_frame
    }

    pub fn sensor_frame(&self) -> &str {
        &self.sensor_frame
    }

    /// Count a frame whose points could not be loaded.
    pub(crate) fn skip_unreadable(&mut self) {
        self.state.stats_mut().unreadable_frames += 1;
    }

    /// Process one frame, sending its events to `output`.
    pub fn process<O: OutputAdapter + ?Sized>(
        &mut self,
        batch: &PointBatch,
        output: &mut O,
    ) -> FrameReport {
        let t_start = Instant::now();

        if self.state.admit_frame() {
            return self.report(batch.timestamp_ns, FrameStatus::WarmUp, batch.len(), 0, t_start);
        }

        let cloud = self.filter.filter(batch);
        info!(
            "Got {} points ({} goods)",
            cloud.total_count,
            cloud.valid_count()
        );

        if cloud.is_empty() {
            error!("No valid points in the cloud");
            self.state.stats_mut().empty_frames += 1;
            self.state.set_keyframe_created(false);
            if self.send_delta_pose {
                output.publish_delta_pose(&DeltaPose::failed(cloud.timestamp_ns));
            }
            return self.report(
                cloud.timestamp_ns,
                FrameStatus::Empty,
                cloud.total_count,
                0,
                t_start,
            );
        }

        let status = self.register(&cloud, output);
        self.broadcast(cloud.timestamp_ns, output);

        self.report(
            cloud.timestamp_ns,
            status,
            cloud.total_count,
            cloud.valid_count(),
            t_start,
        )
    }

    /// Run registration and emit the delta and keyframe events.
    fn register<O: OutputAdapter + ?Sized>(
        &mut self,
        cloud: &FilteredCloud,
        output: &mut O,
    ) -> FrameStatus {
        self.state.stats_mut().registrations += 1;

        match self.registration.match_cloud(&cloud.features) {
            Ok(converged) => {
                info!("match ratio: {:.3}", converged.match_ratio);
                self.state.apply_delta(&converged.delta);

                if self.send_delta_pose {
                    output.publish_delta_pose(&DeltaPose::succeeded(
                        cloud.timestamp_ns,
                        converged.delta,
                    ));
                }

                let keyframe_created = self.registration.keyframe_created_at_last_call();
                self.state.set_keyframe_created(keyframe_created);
                if keyframe_created {
                    warn!("Keyframe created at {:.3}", converged.match_ratio);
                    output.append_path(&PoseStamped {
                        timestamp_ns: cloud.timestamp_ns,
                        pose: *self.state.absolute(),
                    });
                }

                FrameStatus::Tracked {
                    match_ratio: converged.match_ratio,
                }
            }
            Err(err) => {
                warn!("ICP failed to converge: {}", err);
                self.state.stats_mut().failures += 1;
                self.state.set_keyframe_created(false);

                if self.send_delta_pose {
                    output.publish_delta_pose(&DeltaPose::failed(cloud.timestamp_ns));

                    // A failed call never consumed this frame, so it can seed a fresh keyframe.
                    warn!("Resetting tracker on the current frame");
                    self.registration.reset_tracking(&cloud.features);
                }

                FrameStatus::Lost(err)
            }
        }
    }

    fn broadcast<O: OutputAdapter + ?Sized>(&self, timestamp_ns: u64, output: &mut O) {
        output.send_transform(&TransformBroadcast {
            timestamp_ns,
            frame_id: self.fixed_frame.clone(),
            child_frame_id: self.sensor_frame.clone(),
            transform: *self.state.absolute(),
        });
    }

    fn report(
        &self,
        timestamp_ns: u64,
        status: FrameStatus,
        total_points: usize,
        valid_points: usize,
        t_start: Instant,
    ) -> FrameReport {
        FrameReport {
            timestamp_ns,
            keyframe_created: matches!(status, FrameStatus::Tracked { .. })
                && self.state.keyframe_created(),
            status,
            pose: *self.state.absolute(),
            total_points,
            valid_points,
            elapsed_ms: t_start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputEvent, RecordingAdapter};
    use crate::registration::scripted::{ScriptedRegistration, Step};
    use crate::registration::RegistrationError;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::f64::consts::FRAC_PI_2;

    fn config(startup_drop_count: u32, send_delta_pose: bool) -> TrackerConfig {
        TrackerConfig {
            startup_drop_count,
            send_delta_pose,
            partial_image_threshold: 1,
            ..Default::default()
        }
    }

    fn valid_batch(ts: u64) -> PointBatch {
        PointBatch::new(
            ts,
            vec![
                Vector3::new(0.0, 0.0, 1.0),
                Vector3::new(f32::NAN, 0.0, 1.0),
                Vector3::new(1.0, 0.5, 2.0),
            ],
        )
    }

    fn nan_batch(ts: u64) -> PointBatch {
        PointBatch::new(ts, vec![Vector3::new(f32::NAN, f32::NAN, f32::NAN); 4])
    }

    fn yaw_90() -> SE3 {
        SE3::from_axis_angle(&Vector3::z(), FRAC_PI_2, Vector3::new(0.5, -1.0, 0.25))
    }

    #[test]
    fn test_warm_up_frames_emit_nothing() {
        let steps = (0..3).map(|_| Step::converged(SE3::identity(), false));
        let mut engine = TrackingEngine::new(ScriptedRegistration::new(steps), &config(2, true));
        let mut out = RecordingAdapter::new("/world");

        // Warm-up precedes the empty check too.
        let r1 = engine.process(&nan_batch(1), &mut out);
        let r2 = engine.process(&valid_batch(2), &mut out);
        assert_eq!(r1.status, FrameStatus::WarmUp);
        assert_eq!(r2.status, FrameStatus::WarmUp);
        assert!(out.events.is_empty());
        assert!(engine.registration().matched.is_empty());

        let r3 = engine.process(&valid_batch(3), &mut out);
        assert!(r3.is_tracked());
        assert_eq!(out.transforms().count(), 1);
        assert_eq!(engine.registration().matched.len(), 1);
    }

    #[test]
    fn test_empty_frame_skips_registration() {
        let mut engine = TrackingEngine::new(ScriptedRegistration::default(), &config(0, true));
        let mut out = RecordingAdapter::new("/world");

        for ts in 0..3 {
            let report = engine.process(&nan_batch(ts), &mut out);
            assert_eq!(report.status, FrameStatus::Empty);
        }

        assert!(engine.registration().matched.is_empty());
        assert!(engine.registration().resets.is_empty());
        assert_eq!(out.transforms().count(), 0);
        let deltas: Vec<_> = out.delta_poses().collect();
        assert_eq!(deltas.len(), 3);
        assert!(deltas.iter().all(|d| !d.success()));
        assert_eq!(deltas[2].timestamp_ns, 2);
    }

    #[test]
    fn test_empty_frame_without_delta_output_is_silent() {
        let mut engine = TrackingEngine::new(ScriptedRegistration::default(), &config(0, false));
        let mut out = RecordingAdapter::new("/world");

        engine.process(&nan_batch(5), &mut out);

        assert!(out.events.is_empty());
    }

    #[test]
    fn test_success_composes_absolute_pose() {
        let d = yaw_90();
        let steps = vec![Step::converged(d, false), Step::converged(d, false)];
        let mut engine = TrackingEngine::new(ScriptedRegistration::new(steps), &config(0, true));
        let mut out = RecordingAdapter::new("/world");

        engine.process(&valid_batch(1), &mut out);
        assert_relative_eq!(engine.pose().translation, d.translation, epsilon = 1e-12);
        assert_relative_eq!(
            (engine.pose().rotation.inverse() * d.rotation).angle(),
            0.0,
            epsilon = 1e-12
        );

        engine.process(&valid_batch(2), &mut out);
        let expected = d.compose(&d);
        assert_relative_eq!(engine.pose().translation, expected.translation, epsilon = 1e-12);
        assert_relative_eq!(
            engine.pose().transform_point(&Vector3::x()),
            d.transform_point(&d.transform_point(&Vector3::x())),
            epsilon = 1e-12
        );

        let deltas: Vec<_> = out.delta_poses().collect();
        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|p| p.success() && p.delta == Some(d)));

        let last_tf = out.transforms().last().unwrap();
        assert_eq!(last_tf.frame_id, "/world");
        assert_eq!(last_tf.child_frame_id, "/openni_rgb_optical_frame");
        assert_eq!(last_tf.transform, *engine.pose());
    }

    #[test]
    fn test_failure_keeps_pose_and_resets_keyframe() {
        let d = yaw_90();
        let steps = vec![Step::converged(d, true), Step::failed()];
        let mut engine = TrackingEngine::new(ScriptedRegistration::new(steps), &config(0, true));
        let mut out = RecordingAdapter::new("/world");

        engine.process(&valid_batch(1), &mut out);
        let before = *engine.pose();
        out.clear();

        let report = engine.process(&valid_batch(2), &mut out);

        assert!(matches!(
            report.status,
            FrameStatus::Lost(RegistrationError::ConvergenceFailure { .. })
        ));
        assert!(!report.keyframe_created);
        assert_eq!(*engine.pose(), before);

        let reg = engine.registration();
        assert_eq!(reg.resets.len(), 1);
        assert_eq!(reg.resets[0], reg.matched[1]);

        assert_eq!(out.keyframes().count(), 0);
        let delta = out.delta_poses().next().unwrap();
        assert!(!delta.success());
        let tf = out.transforms().next().unwrap();
        assert_eq!(tf.transform, before);
        assert_eq!(tf.timestamp_ns, 2);
    }

    #[test]
    fn test_failure_without_delta_output_keeps_keyframe() {
        let mut engine =
            TrackingEngine::new(ScriptedRegistration::new(vec![Step::failed()]), &config(0, false));
        let mut out = RecordingAdapter::new("/world");

        engine.process(&valid_batch(1), &mut out);

        assert_eq!(out.events.len(), 1);
        assert_eq!(out.transforms().next().unwrap().transform, SE3::identity());
        assert_eq!(out.delta_poses().count(), 0);
        // The keyframe is left alone when delta output is off.
        assert!(engine.registration().resets.is_empty());
        assert_eq!(engine.state().stats().failures, 1);
    }

    #[test]
    fn test_keyframe_event_follows_registration_flag() {
        let flags = [true, false, false, true, false];
        let steps = flags.iter().map(|&kf| {
            Step::converged(SE3::from_translation(Vector3::new(0.1, 0.0, 0.0)), kf)
        });
        let mut engine = TrackingEngine::new(ScriptedRegistration::new(steps), &config(0, false));
        let mut out = RecordingAdapter::new("/world");

        for (i, &kf) in flags.iter().enumerate() {
            let before = out.path.len();
            let report = engine.process(&valid_batch(i as u64), &mut out);
            assert_eq!(report.keyframe_created, kf);
            assert_eq!(out.path.len() - before, kf as usize);
        }

        assert_eq!(out.delta_poses().count(), 0);
        assert_eq!(out.transforms().count(), flags.len());

        let path = &out.path.poses;
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].timestamp_ns, 0);
        assert_relative_eq!(path[0].pose.translation.x, 0.1, epsilon = 1e-12);
        assert_eq!(path[1].timestamp_ns, 3);
        assert_relative_eq!(path[1].pose.translation.x, 0.4, epsilon = 1e-12);
        assert_eq!(engine.state().stats().keyframes, 2);
    }

    #[test]
    fn test_end_to_end_three_frames() {
        let steps = vec![Step::converged(SE3::identity(), true), Step::failed()];
        let mut engine = TrackingEngine::new(ScriptedRegistration::new(steps), &config(0, true));
        let mut out = RecordingAdapter::new("/world");

        // (1) all-NaN frame: sentinel delta only.
        engine.process(&nan_batch(100), &mut out);
        assert_eq!(out.events.len(), 1);
        assert!(matches!(
            &out.events[0],
            OutputEvent::DeltaPose(d) if !d.success() && d.timestamp_ns == 100
        ));

        // (2) bootstrap keyframe: identity broadcast and a path entry.
        engine.process(&valid_batch(200), &mut out);
        let tf2 = out.transforms().last().unwrap().clone();
        assert_eq!(tf2.timestamp_ns, 200);
        assert_relative_eq!(tf2.transform.translation.norm(), 0.0, epsilon = 1e-12);
        assert_eq!(out.keyframes().count(), 1);

        // (3) convergence failure: unchanged broadcast, sentinel, silent reset.
        engine.process(&valid_batch(300), &mut out);
        let tf3 = out.transforms().last().unwrap();
        assert_eq!(tf3.timestamp_ns, 300);
        assert_eq!(tf3.transform, tf2.transform);
        assert!(!out.delta_poses().last().unwrap().success());
        assert_eq!(out.keyframes().count(), 1);

        let reg = engine.registration();
        assert_eq!(reg.matched.len(), 2);
        assert_eq!(reg.resets.len(), 1);
        assert_eq!(reg.resets[0].num_points(), 2);
    }
}
